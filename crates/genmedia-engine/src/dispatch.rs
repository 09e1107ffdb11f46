use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use genmedia_contracts::events::{EventKind, EventWriter};
use genmedia_contracts::models::VideoModel;
use genmedia_contracts::request::{mime_for_path, CanonicalRequest, GenerationMode, MediaParams};
use genmedia_contracts::runs::receipts::{build_receipt, write_receipt, ArtifactRecord};
use genmedia_contracts::GenerationError;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::{error_chain_text, is_retryable_error, MediaClient};

/// Veo clips are eight seconds long.
const VIDEO_CLIP_SECONDS: f64 = 8.0;

#[derive(Debug, Clone)]
pub struct MediaArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub provider: String,
    pub model: String,
    pub mode: GenerationMode,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl MediaArtifact {
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub artifact: MediaArtifact,
    pub saved_path: PathBuf,
    pub receipt_path: Option<PathBuf>,
}

pub fn estimate_video_cost_usd(model: VideoModel) -> f64 {
    model.cost_per_second_usd() * VIDEO_CLIP_SECONDS
}

/// Sends one validated request to `client`. Called once per request; failures
/// are returned as-is with a retry hint.
pub fn dispatch(
    request: &CanonicalRequest,
    client: &dyn MediaClient,
) -> Result<MediaArtifact, GenerationError> {
    let started = Instant::now();
    let input = request.input_image.as_ref();
    let result = match &request.params {
        MediaParams::Image { resolution } => {
            client.generate_image(&request.prompt, *resolution, input)
        }
        MediaParams::Video {
            model,
            negative_prompt,
        } => client.generate_video(&request.prompt, *model, negative_prompt.as_deref(), input),
    };
    let output = result.map_err(|err| GenerationError::UpstreamDispatch {
        provider: client.name().to_string(),
        message: error_chain_text(&err, 1024),
        retryable: is_retryable_error(&err),
    })?;
    if output.bytes.is_empty() {
        return Err(GenerationError::UpstreamDispatch {
            provider: client.name().to_string(),
            message: "empty artifact returned".to_string(),
            retryable: false,
        });
    }

    let mut warnings = request.warnings.clone();
    for warning in output.warnings {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
    if let Some(expected) = mime_for_path(&request.output_path) {
        if !same_mime(expected, &output.mime_type) {
            warnings.push(format!(
                "{} returned {} but {} implies {expected}.",
                client.name(),
                output.mime_type,
                request.output_path.display()
            ));
        }
    }

    Ok(MediaArtifact {
        bytes: output.bytes,
        mime_type: output.mime_type,
        provider: client.name().to_string(),
        model: output.model,
        mode: request.mode,
        provider_request: output.provider_request,
        provider_response: output.provider_response,
        warnings,
        elapsed: started.elapsed(),
    })
}

/// Writes the artifact and returns its absolute path.
pub fn write_artifact(artifact: &MediaArtifact, path: &Path) -> Result<PathBuf, GenerationError> {
    fs::write(path, &artifact.bytes).map_err(|err| GenerationError::ArtifactWrite {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    Ok(fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf()))
}

fn same_mime(expected: &str, actual: &str) -> bool {
    let normalize = |value: &str| {
        let base = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if base == "image/jpg" {
            "image/jpeg".to_string()
        } else {
            base
        }
    };
    normalize(expected) == normalize(actual)
}

/// Runs dispatch, artifact write and receipt for one request, logging each
/// step to the optional event log.
pub struct Dispatcher {
    client: Box<dyn MediaClient>,
    events: Option<EventWriter>,
    receipt_path: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(client: Box<dyn MediaClient>) -> Self {
        Self {
            client,
            events: None,
            receipt_path: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_receipt(mut self, path: impl Into<PathBuf>) -> Self {
        self.receipt_path = Some(path.into());
        self
    }

    pub fn client(&self) -> &dyn MediaClient {
        self.client.as_ref()
    }

    pub fn run(&self, request: &CanonicalRequest) -> Result<DispatchOutcome, GenerationError> {
        self.emit(EventKind::RequestResolved, json!({ "request": request.summary() }))?;

        let mut started = json!({
            "provider": self.client.name(),
            "mode": request.mode.as_str(),
        });
        match &request.params {
            MediaParams::Image { resolution } => {
                started["resolution"] = json!(resolution.as_str());
            }
            MediaParams::Video { model, .. } => {
                started["model"] = json!(model.id());
                started["estimated_cost_usd"] = json!(estimate_video_cost_usd(*model));
            }
        }
        self.emit(EventKind::DispatchStarted, started)?;

        let mut artifact = match dispatch(request, self.client.as_ref()) {
            Ok(artifact) => artifact,
            Err(err) => {
                // Returns the upstream error even if this line cannot be logged.
                let _ = self.emit(
                    EventKind::DispatchFailed,
                    json!({
                        "provider": self.client.name(),
                        "error_kind": err.kind(),
                        "message": err.to_string(),
                        "retryable": err.is_retryable(),
                    }),
                );
                return Err(err);
            }
        };

        let saved_path = write_artifact(&artifact, &request.output_path)?;

        // Once the artifact is on disk, log and receipt failures become warnings.
        let record = ArtifactRecord {
            path: saved_path.to_string_lossy().to_string(),
            mime_type: artifact.mime_type.clone(),
            bytes: artifact.bytes.len() as u64,
            sha256: artifact.sha256_hex(),
            provider: artifact.provider.clone(),
            model: artifact.model.clone(),
            elapsed_ms: artifact.elapsed.as_millis() as u64,
        };
        if let Err(err) = self.emit(
            EventKind::ArtifactWritten,
            json!({ "artifact": record, "warnings": artifact.warnings }),
        ) {
            artifact.warnings.push(format!("Event log not written: {err:#}"));
        }

        let receipt_path = self.receipt_path.as_ref().and_then(|path| {
            let payload = build_receipt(
                request,
                &record,
                &artifact.provider_request,
                &artifact.provider_response,
                &artifact.warnings,
            );
            if let Err(err) = write_receipt(path, &payload) {
                artifact
                    .warnings
                    .push(format!("Receipt not written to {}: {err:#}", path.display()));
                return None;
            }
            if let Err(err) =
                self.emit(EventKind::ReceiptWritten, json!({ "path": path.to_string_lossy() }))
            {
                artifact.warnings.push(format!("Event log not written: {err:#}"));
            }
            Some(path.clone())
        });

        Ok(DispatchOutcome {
            artifact,
            saved_path,
            receipt_path,
        })
    }

    fn emit(&self, kind: EventKind, payload: Value) -> Result<(), GenerationError> {
        let Some(events) = &self.events else {
            return Ok(());
        };
        events
            .emit_value(kind, payload)
            .map(|_| ())
            .map_err(|err| GenerationError::ArtifactWrite {
                path: events.path().to_path_buf(),
                reason: format!("event log write failed: {err:#}"),
            })
    }
}
