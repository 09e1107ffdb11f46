use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::lookup_key;

/// Output size tier accepted by the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed by lower-cased, whitespace-collapsed hint text.
const RESOLUTION_SYNONYMS: &[(&str, Resolution)] = &[
    ("1k", Resolution::OneK),
    ("low res", Resolution::OneK),
    ("low-res", Resolution::OneK),
    ("low", Resolution::OneK),
    ("1080p", Resolution::OneK),
    ("1024", Resolution::OneK),
    ("2k", Resolution::TwoK),
    ("medium", Resolution::TwoK),
    ("2048", Resolution::TwoK),
    ("4k", Resolution::FourK),
    ("high res", Resolution::FourK),
    ("high-res", Resolution::FourK),
    ("hi-res", Resolution::FourK),
    ("hires", Resolution::FourK),
    ("high", Resolution::FourK),
    ("ultra", Resolution::FourK),
    ("4096", Resolution::FourK),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSelection {
    pub resolution: Resolution,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

pub fn lookup_resolution(hint: &str) -> Option<Resolution> {
    let key = lookup_key(hint);
    RESOLUTION_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, resolution)| *resolution)
}

/// Resolves a hint and explains any fallback to the default tier.
pub fn select_resolution(hint: Option<&str>) -> ResolutionSelection {
    let requested = hint.map(str::trim).filter(|value| !value.is_empty());
    let Some(requested_value) = requested else {
        return ResolutionSelection {
            resolution: Resolution::default(),
            requested: None,
            fallback_reason: None,
        };
    };

    match lookup_resolution(requested_value) {
        Some(resolution) => ResolutionSelection {
            resolution,
            requested: Some(requested_value.to_string()),
            fallback_reason: None,
        },
        None => ResolutionSelection {
            resolution: Resolution::default(),
            requested: Some(requested_value.to_string()),
            fallback_reason: Some(format!(
                "Unrecognized resolution '{requested_value}'; using {}.",
                Resolution::default()
            )),
        },
    }
}

/// Resolution is a quality hint, so unknown input fails open to 1K.
pub fn normalize_resolution(hint: Option<&str>) -> Resolution {
    select_resolution(hint).resolution
}
