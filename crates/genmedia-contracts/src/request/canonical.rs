use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::credentials::{resolve_credential, Credential};
use super::mode::{resolve_media_kind, select_mode, GenerationMode, MediaKind};
use super::resolution::{select_resolution, Resolution};
use crate::error::GenerationError;
use crate::models::{ModelSelector, VideoModel};
use crate::settings::Settings;

/// Loosely specified generation intent, as typed by a person.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub output_path: PathBuf,
    pub media_kind: Option<MediaKind>,
    pub input_image_path: Option<PathBuf>,
    pub resolution_hint: Option<String>,
    pub model_hint: Option<String>,
    pub negative_prompt: Option<String>,
    pub api_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = Some(kind);
        self
    }

    pub fn with_input_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_image_path = Some(path.into());
        self
    }

    pub fn with_resolution(mut self, hint: impl Into<String>) -> Self {
        self.resolution_hint = Some(hint.into());
        self
    }

    pub fn with_model(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    pub fn with_negative_prompt(mut self, text: impl Into<String>) -> Self {
        self.negative_prompt = Some(text.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("prompt", &self.prompt)
            .field("output_path", &self.output_path)
            .field("media_kind", &self.media_kind)
            .field("input_image_path", &self.input_image_path)
            .field("resolution_hint", &self.resolution_hint)
            .field("model_hint", &self.model_hint)
            .field("negative_prompt", &self.negative_prompt)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Input image bytes, read once during validation.
#[derive(Clone, PartialEq, Eq)]
pub struct InputImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl fmt::Debug for InputImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputImage")
            .field("path", &self.path)
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaParams {
    Image {
        resolution: Resolution,
    },
    Video {
        model: VideoModel,
        negative_prompt: Option<String>,
    },
}

impl MediaParams {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image { .. } => MediaKind::Image,
            Self::Video { .. } => MediaKind::Video,
        }
    }
}

/// Fully validated request, ready for a media client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub prompt: String,
    pub output_path: PathBuf,
    pub mode: GenerationMode,
    pub params: MediaParams,
    pub input_image: Option<InputImage>,
    pub credential: Credential,
    pub requested_hint: Option<String>,
    pub fallback_reason: Option<String>,
    pub warnings: Vec<String>,
}

impl CanonicalRequest {
    pub fn resolution(&self) -> Option<Resolution> {
        match &self.params {
            MediaParams::Image { resolution } => Some(*resolution),
            MediaParams::Video { .. } => None,
        }
    }

    pub fn video_model(&self) -> Option<VideoModel> {
        match &self.params {
            MediaParams::Video { model, .. } => Some(*model),
            MediaParams::Image { .. } => None,
        }
    }

    /// Key-free description used by events and receipts.
    pub fn summary(&self) -> Value {
        let mut summary = json!({
            "prompt": self.prompt,
            "output_path": self.output_path.to_string_lossy(),
            "mode": self.mode.as_str(),
            "media_kind": self.mode.media_kind().as_str(),
            "credential_source": self.credential.source(),
            "requested_hint": self.requested_hint,
            "fallback_reason": self.fallback_reason,
            "warnings": self.warnings,
        });
        match &self.params {
            MediaParams::Image { resolution } => {
                summary["resolution"] = json!(resolution.as_str());
            }
            MediaParams::Video {
                model,
                negative_prompt,
            } => {
                summary["model"] = json!(model.id());
                summary["negative_prompt"] = json!(negative_prompt);
            }
        }
        if let Some(input) = &self.input_image {
            summary["input_image"] = json!({
                "path": input.path.to_string_lossy(),
                "mime_type": input.mime_type,
                "bytes": input.bytes.len(),
            });
        }
        summary
    }
}

/// Checks run cheapest-first: prompt, output path, input image, credential.
pub fn validate(
    request: &GenerationRequest,
    settings: &Settings,
) -> Result<CanonicalRequest, GenerationError> {
    if request.prompt.trim().is_empty() {
        return Err(GenerationError::InvalidPrompt);
    }

    let mut warnings = Vec::new();
    let kind = resolve_media_kind(request.media_kind, &request.output_path).ok_or_else(|| {
        GenerationError::InvalidOutputPath {
            path: request.output_path.clone(),
            reason: "cannot tell image from video output by the file extension".to_string(),
        }
    })?;
    if let Some(warning) = kind.warning {
        push_unique_warning(&mut warnings, warning);
    }
    check_output_path(&request.output_path)?;

    let input_image = request
        .input_image_path
        .as_deref()
        .map(|path| load_input_image(path, kind.kind))
        .transpose()?;
    let mode = select_mode(kind.kind, input_image.is_some());

    let (params, requested_hint, fallback_reason) = match kind.kind {
        MediaKind::Image => {
            if has_text(request.model_hint.as_deref()) {
                push_unique_warning(
                    &mut warnings,
                    "Model hint ignored for image output.".to_string(),
                );
            }
            if has_text(request.negative_prompt.as_deref()) {
                push_unique_warning(
                    &mut warnings,
                    "Negative prompt ignored for image output.".to_string(),
                );
            }
            let selection = select_resolution(request.resolution_hint.as_deref());
            (
                MediaParams::Image {
                    resolution: selection.resolution,
                },
                selection.requested,
                selection.fallback_reason,
            )
        }
        MediaKind::Video => {
            if has_text(request.resolution_hint.as_deref()) {
                push_unique_warning(
                    &mut warnings,
                    "Resolution hint ignored for video output.".to_string(),
                );
            }
            let selection = ModelSelector::default().select(request.model_hint.as_deref());
            let negative_prompt = request
                .negative_prompt
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            (
                MediaParams::Video {
                    model: selection.model,
                    negative_prompt,
                },
                selection.requested,
                selection.fallback_reason,
            )
        }
    };
    if requested_hint.is_some() {
        if let Some(reason) = &fallback_reason {
            push_unique_warning(&mut warnings, reason.clone());
        }
    }

    let credential = resolve_credential(request.api_key.as_deref(), settings)?;

    Ok(CanonicalRequest {
        prompt: request.prompt.clone(),
        output_path: request.output_path.clone(),
        mode,
        params,
        input_image,
        credential,
        requested_hint,
        fallback_reason,
        warnings,
    })
}

fn check_output_path(path: &Path) -> Result<(), GenerationError> {
    let invalid = |reason: String| GenerationError::InvalidOutputPath {
        path: path.to_path_buf(),
        reason,
    };
    if path.file_name().is_none() {
        return Err(invalid("path has no file name".to_string()));
    }
    if path.is_dir() {
        return Err(invalid("path is a directory".to_string()));
    }
    let parent = path
        .parent()
        .filter(|value| !value.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent.is_dir() {
        return Err(invalid(format!(
            "parent directory {} does not exist",
            parent.display()
        )));
    }
    Ok(())
}

/// Unknown extensions are sent as PNG for image edits and JPEG for video frames.
fn load_input_image(path: &Path, kind: MediaKind) -> Result<InputImage, GenerationError> {
    let unreadable = |reason: String| GenerationError::UnreadableInputImage {
        path: path.to_path_buf(),
        reason,
    };
    let metadata = fs::metadata(path).map_err(|err| unreadable(err.to_string()))?;
    if !metadata.is_file() {
        return Err(unreadable("not a regular file".to_string()));
    }
    let bytes = fs::read(path).map_err(|err| unreadable(err.to_string()))?;
    if bytes.is_empty() {
        return Err(unreadable("file is empty".to_string()));
    }
    Ok(InputImage {
        path: path.to_path_buf(),
        bytes,
        mime_type: mime_for_path(path).unwrap_or(match kind {
            MediaKind::Image => "image/png",
            MediaKind::Video => "image/jpeg",
        }),
    })
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.map(str::trim).is_some_and(|value| !value.is_empty())
}

fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() || warnings.contains(&message) {
        return;
    }
    warnings.push(message);
}
