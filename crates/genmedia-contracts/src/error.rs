use std::path::PathBuf;

/// Terminal failures for a single generation invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("no API key provided; set GEMINI_API_KEY or pass --api-key")]
    MissingCredential,

    #[error("prompt must not be empty")]
    InvalidPrompt,

    #[error("input image {} is unreadable: {reason}", path.display())]
    UnreadableInputImage { path: PathBuf, reason: String },

    #[error("output path {} is invalid: {reason}", path.display())]
    InvalidOutputPath { path: PathBuf, reason: String },

    #[error("{provider} request failed: {message}")]
    UpstreamDispatch {
        provider: String,
        message: String,
        retryable: bool,
    },

    #[error("failed to write {}: {reason}", path.display())]
    ArtifactWrite { path: PathBuf, reason: String },
}

impl GenerationError {
    /// Stable snake_case name used in events and receipts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidPrompt => "invalid_prompt",
            Self::UnreadableInputImage { .. } => "unreadable_input_image",
            Self::InvalidOutputPath { .. } => "invalid_output_path",
            Self::UpstreamDispatch { .. } => "upstream_dispatch",
            Self::ArtifactWrite { .. } => "artifact_write",
        }
    }

    /// Whether a caller could reasonably retry the same request.
    /// The dispatcher itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamDispatch { retryable: true, .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingCredential
            | Self::InvalidPrompt
            | Self::UnreadableInputImage { .. }
            | Self::InvalidOutputPath { .. } => 2,
            Self::UpstreamDispatch { .. } => 3,
            Self::ArtifactWrite { .. } => 1,
        }
    }
}
