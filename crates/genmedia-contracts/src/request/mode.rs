use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Infers the media kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(|value| value.to_ascii_lowercase())?;
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "webp" => Some(Self::Image),
            "mp4" | "mov" | "webm" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    TextToImage,
    ImageToImage,
    TextToVideo,
    ImageToVideo,
}

impl GenerationMode {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            Self::TextToImage | Self::ImageToImage => MediaKind::Image,
            Self::TextToVideo | Self::ImageToVideo => MediaKind::Video,
        }
    }

    pub fn uses_input_image(&self) -> bool {
        matches!(self, Self::ImageToImage | Self::ImageToVideo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToImage => "text_to_image",
            Self::ImageToImage => "image_to_image",
            Self::TextToVideo => "text_to_video",
            Self::ImageToVideo => "image_to_video",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn select_mode(kind: MediaKind, has_input_image: bool) -> GenerationMode {
    match (kind, has_input_image) {
        (MediaKind::Image, false) => GenerationMode::TextToImage,
        (MediaKind::Image, true) => GenerationMode::ImageToImage,
        (MediaKind::Video, false) => GenerationMode::TextToVideo,
        (MediaKind::Video, true) => GenerationMode::ImageToVideo,
    }
}

/// Outcome of reconciling an explicit media kind with the output extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindResolution {
    pub kind: MediaKind,
    pub warning: Option<String>,
}

/// An explicit kind wins over the extension; `None` means neither source
/// could decide.
pub fn resolve_media_kind(explicit: Option<MediaKind>, output_path: &Path) -> Option<KindResolution> {
    let inferred = MediaKind::from_path(output_path);
    match (explicit, inferred) {
        (Some(kind), Some(ext_kind)) if kind != ext_kind => Some(KindResolution {
            kind,
            warning: Some(format!(
                "Output {} looks like a {ext_kind} file but {kind} output was requested.",
                output_path.display()
            )),
        }),
        (Some(kind), _) => Some(KindResolution {
            kind,
            warning: None,
        }),
        (None, Some(kind)) => Some(KindResolution {
            kind,
            warning: None,
        }),
        (None, None) => None,
    }
}
