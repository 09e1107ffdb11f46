use std::fmt;

use crate::error::GenerationError;
use crate::settings::{ProviderKind, Settings};

/// API credential together with where it came from.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Explicit(String),
    Environment(String),
    /// The offline client needs no key.
    Offline,
}

impl Credential {
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::Explicit(key) | Self::Environment(key) => Some(key.as_str()),
            Self::Offline => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Explicit(_) => "argument",
            Self::Environment(_) => "environment",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.source())
    }
}

/// Explicit key, then `GEMINI_API_KEY`, then offline when the dry-run client
/// is configured. Blank values count as absent.
pub fn resolve_credential(
    explicit: Option<&str>,
    settings: &Settings,
) -> Result<Credential, GenerationError> {
    if let Some(key) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(Credential::Explicit(key.to_string()));
    }
    if let Some(key) = settings
        .gemini_api_key
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Ok(Credential::Environment(key.to_string()));
    }
    if settings.provider == ProviderKind::Dryrun {
        return Ok(Credential::Offline);
    }
    Err(GenerationError::MissingCredential)
}
