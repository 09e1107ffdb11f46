use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use genmedia_contracts::events::EventWriter;
use genmedia_contracts::request::{validate, GenerationRequest, MediaKind, MediaParams};
use genmedia_contracts::settings::{ProviderKind, Settings};
use genmedia_contracts::GenerationError;
use genmedia_engine::{client_for, DispatchOutcome, Dispatcher, ProgressFn};

#[derive(Debug, Parser)]
#[command(
    name = "generate-image",
    version,
    about = "Generate or edit an image with Gemini 3 Pro Image"
)]
pub struct ImageArgs {
    /// Image description or edit instruction.
    #[arg(long)]
    pub prompt: String,
    /// Output file, e.g. out.png.
    #[arg(long)]
    pub filename: PathBuf,
    /// Source image to edit.
    #[arg(long)]
    pub input_image: Option<PathBuf>,
    /// 1K, 2K or 4K; loose forms like "high res" are accepted.
    #[arg(long, default_value = "1K")]
    pub resolution: String,
    /// Overrides GEMINI_API_KEY.
    #[arg(long)]
    pub api_key: Option<String>,
    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Debug, Parser)]
#[command(
    name = "generate-video",
    version,
    about = "Generate a video clip with Veo 3 / 3.1"
)]
pub struct VideoArgs {
    /// Scene description; include quoted dialogue for the 3.1 models.
    #[arg(long)]
    pub prompt: String,
    /// Output file, e.g. out.mp4.
    #[arg(long)]
    pub filename: PathBuf,
    /// standard, fast, dialogue, dialogue-fast or a full model id.
    #[arg(long, default_value = "standard")]
    pub model: String,
    /// Things the clip should avoid.
    #[arg(long)]
    pub negative: Option<String>,
    /// First frame to animate.
    #[arg(long)]
    pub input_image: Option<PathBuf>,
    /// Overrides GEMINI_API_KEY.
    #[arg(long)]
    pub api_key: Option<String>,
    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunOptions {
    /// Render a placeholder locally instead of calling the API.
    #[arg(long)]
    pub dry_run: bool,
    /// Append JSONL events to this file.
    #[arg(long)]
    pub events: Option<PathBuf>,
    /// Write a JSON receipt for the artifact to this file.
    #[arg(long)]
    pub receipt: Option<PathBuf>,
}

impl ImageArgs {
    pub fn to_request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(&self.prompt, &self.filename)
            .with_media_kind(MediaKind::Image)
            .with_resolution(&self.resolution);
        request.input_image_path = self.input_image.clone();
        request.api_key = self.api_key.clone();
        request
    }
}

impl VideoArgs {
    pub fn to_request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(&self.prompt, &self.filename)
            .with_media_kind(MediaKind::Video)
            .with_model(&self.model);
        request.negative_prompt = self.negative.clone();
        request.input_image_path = self.input_image.clone();
        request.api_key = self.api_key.clone();
        request
    }
}

pub fn run_image(args: ImageArgs, settings: &Settings) -> Result<i32> {
    let outcome = generate(&args.to_request(), &args.run, settings)?;
    println!("Image saved: {}", outcome.saved_path.display());
    Ok(0)
}

pub fn run_video(args: VideoArgs, settings: &Settings) -> Result<i32> {
    let outcome = generate(&args.to_request(), &args.run, settings)?;
    println!("Video saved: {}", outcome.saved_path.display());
    Ok(0)
}

/// Validates, dispatches and writes one artifact.
pub fn generate(
    request: &GenerationRequest,
    options: &RunOptions,
    settings: &Settings,
) -> Result<DispatchOutcome> {
    let settings = if options.dry_run {
        settings.clone().with_provider(ProviderKind::Dryrun)
    } else {
        settings.clone()
    };
    let canonical = validate(request, &settings)?;
    for warning in &canonical.warnings {
        eprintln!("warning: {warning}");
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let events = options
        .events
        .as_ref()
        .map(|path| EventWriter::new(path, run_id.as_str()));
    let progress: ProgressFn = Arc::new(|line: &str| println!("{line}"));
    let client = client_for(&settings, &canonical.credential, events.clone(), Some(progress))
        .context("failed to set up the media client")?;

    match &canonical.params {
        MediaParams::Image { resolution } => println!(
            "Generating image ({}, {resolution}) with {}...",
            canonical.mode,
            client.name()
        ),
        MediaParams::Video { model, .. } => println!(
            "Generating video ({}, {}) with {}; this can take several minutes...",
            canonical.mode,
            model.id(),
            client.name()
        ),
    }

    let mut dispatcher = Dispatcher::new(client);
    if let Some(events) = events {
        dispatcher = dispatcher.with_events(events);
    }
    if let Some(path) = &options.receipt {
        dispatcher = dispatcher.with_receipt(path);
    }
    let outcome = dispatcher.run(&canonical)?;
    for warning in outcome
        .artifact
        .warnings
        .iter()
        .filter(|warning| !canonical.warnings.contains(warning))
    {
        eprintln!("warning: {warning}");
    }
    Ok(outcome)
}

/// Process exit code for a failed invocation.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<GenerationError>()
        .map(GenerationError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use genmedia_contracts::models::VideoModel;
    use genmedia_contracts::request::{GenerationMode, MediaKind};
    use genmedia_contracts::settings::Settings;
    use genmedia_contracts::GenerationError;
    use serde_json::Value;

    use super::{exit_code_for, generate, run_image, run_video, ImageArgs, VideoArgs};

    #[test]
    fn image_args_parse_with_defaults() -> anyhow::Result<()> {
        let args = ImageArgs::try_parse_from([
            "generate-image",
            "--prompt",
            "a red bicycle",
            "--filename",
            "out.png",
        ])?;
        assert_eq!(args.resolution, "1K");
        assert!(!args.run.dry_run);
        assert!(args.input_image.is_none());

        let request = args.to_request();
        assert_eq!(request.media_kind, Some(MediaKind::Image));
        assert_eq!(request.resolution_hint.as_deref(), Some("1K"));
        assert!(request.model_hint.is_none());
        Ok(())
    }

    #[test]
    fn video_args_carry_every_flag() -> anyhow::Result<()> {
        let args = VideoArgs::try_parse_from([
            "generate-video",
            "--prompt",
            "ocean waves",
            "--filename",
            "clip.mp4",
            "--model",
            "fast",
            "--negative",
            "boats",
            "--input-image",
            "frame.png",
            "--api-key",
            "arg-key",
            "--dry-run",
            "--events",
            "events.jsonl",
            "--receipt",
            "receipt.json",
        ])?;
        assert!(args.run.dry_run);
        let request = args.to_request();
        assert_eq!(request.media_kind, Some(MediaKind::Video));
        assert_eq!(request.model_hint.as_deref(), Some("fast"));
        assert_eq!(request.negative_prompt.as_deref(), Some("boats"));
        assert_eq!(request.api_key.as_deref(), Some("arg-key"));
        assert_eq!(
            request.input_image_path.as_deref(),
            Some(std::path::Path::new("frame.png"))
        );
        Ok(())
    }

    #[test]
    fn prompt_and_filename_are_required() {
        assert!(ImageArgs::try_parse_from(["generate-image", "--filename", "out.png"]).is_err());
        assert!(VideoArgs::try_parse_from(["generate-video", "--prompt", "waves"]).is_err());
    }

    #[test]
    fn dry_run_image_writes_artifact_events_and_receipt() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let output = temp.path().join("out.png");
        let events = temp.path().join("logs").join("events.jsonl");
        let receipt = temp.path().join("out.receipt.json");
        let args = ImageArgs::try_parse_from([
            "generate-image".to_string(),
            "--prompt".to_string(),
            "a red bicycle".to_string(),
            "--filename".to_string(),
            output.to_string_lossy().to_string(),
            "--resolution".to_string(),
            "high res".to_string(),
            "--dry-run".to_string(),
            "--events".to_string(),
            events.to_string_lossy().to_string(),
            "--receipt".to_string(),
            receipt.to_string_lossy().to_string(),
        ])?;

        let outcome = generate(&args.to_request(), &args.run, &Settings::default())?;
        assert_eq!(outcome.artifact.mode, GenerationMode::TextToImage);
        assert!(fs::read(&output)?.starts_with(&[0x89, b'P', b'N', b'G']));

        let lines = fs::read_to_string(&events)?;
        let first: Value = serde_json::from_str(lines.lines().next().unwrap_or_default())?;
        assert_eq!(first["type"], "request_resolved");
        assert_eq!(first["request"]["resolution"], "4K");
        assert!(uuid::Uuid::parse_str(first["run_id"].as_str().unwrap_or_default()).is_ok());

        let receipt: Value = serde_json::from_str(&fs::read_to_string(&receipt)?)?;
        assert_eq!(receipt["artifact"]["provider"], "dryrun");
        Ok(())
    }

    #[test]
    fn dry_run_video_from_frame() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let frame = temp.path().join("frame.png");
        fs::write(&frame, [0x89, b'P', b'N', b'G'])?;
        let output = temp.path().join("clip.mp4");
        let args = VideoArgs::try_parse_from([
            "generate-video".to_string(),
            "--prompt".to_string(),
            "the frame comes alive".to_string(),
            "--filename".to_string(),
            output.to_string_lossy().to_string(),
            "--input-image".to_string(),
            frame.to_string_lossy().to_string(),
            "--model".to_string(),
            "dialogue".to_string(),
            "--dry-run".to_string(),
        ])?;

        let request = args.to_request();
        let outcome = generate(&request, &args.run, &Settings::default())?;
        assert_eq!(outcome.artifact.mode, GenerationMode::ImageToVideo);
        assert_eq!(
            outcome.artifact.provider_request["model"],
            VideoModel::Dialogue.id()
        );
        assert_eq!(run_video(args, &Settings::default())?, 0);
        assert!(output.exists());
        Ok(())
    }

    #[test]
    fn missing_key_maps_to_usage_exit_code() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let output = temp.path().join("out.png");
        let args = ImageArgs::try_parse_from([
            "generate-image".to_string(),
            "--prompt".to_string(),
            "boat".to_string(),
            "--filename".to_string(),
            output.to_string_lossy().to_string(),
        ])?;

        let err = run_image(args, &Settings::default())
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected a missing credential error"))?;
        assert_eq!(
            err.downcast_ref::<GenerationError>(),
            Some(&GenerationError::MissingCredential)
        );
        assert_eq!(exit_code_for(&err), 2);
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn unexpected_errors_exit_with_one() {
        assert_eq!(exit_code_for(&anyhow::anyhow!("disk on fire")), 1);
        let upstream = anyhow::Error::new(GenerationError::UpstreamDispatch {
            provider: "gemini".to_string(),
            message: "HTTP 500".to_string(),
            retryable: true,
        });
        assert_eq!(exit_code_for(&upstream), 3);
    }
}
