use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_VIDEO_POLL_SECS: u64 = 20;
const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 600;

/// Which media client handles dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Gemini,
    Dryrun,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "dryrun" | "dry-run" | "offline" => Some(Self::Dryrun),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Dryrun => "dryrun",
        }
    }
}

/// Process-wide configuration, read from the environment once per invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub api_base: String,
    pub request_timeout: Duration,
    pub video_poll_interval: Duration,
    pub video_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            gemini_api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            video_poll_interval: Duration::from_secs(DEFAULT_VIDEO_POLL_SECS),
            video_timeout: Duration::from_secs(DEFAULT_VIDEO_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup so tests never touch the
    /// real process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let seconds = |key: &str, default: u64| {
            let secs = non_empty(key)
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default);
            Duration::from_secs(secs)
        };

        Self {
            provider: non_empty("GENMEDIA_PROVIDER")
                .and_then(|value| ProviderKind::parse(&value))
                .unwrap_or_default(),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout: seconds("GENMEDIA_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            video_poll_interval: seconds("GENMEDIA_VIDEO_POLL_SECS", DEFAULT_VIDEO_POLL_SECS),
            video_timeout: seconds("GENMEDIA_VIDEO_TIMEOUT_SECS", DEFAULT_VIDEO_TIMEOUT_SECS),
        }
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .field("video_poll_interval", &self.video_poll_interval)
            .field("video_timeout", &self.video_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{ProviderKind, Settings, DEFAULT_API_BASE};

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let settings = settings_from(&[]);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.video_poll_interval, Duration::from_secs(20));
    }

    #[test]
    fn blank_api_key_counts_as_absent() {
        let settings = settings_from(&[("GEMINI_API_KEY", "   ")]);
        assert!(settings.gemini_api_key.is_none());
    }

    #[test]
    fn overrides_are_trimmed_and_validated() {
        let settings = settings_from(&[
            ("GEMINI_API_KEY", " key-1 "),
            ("GEMINI_API_BASE", "http://localhost:9000/v1beta/"),
            ("GENMEDIA_PROVIDER", "DryRun"),
            ("GENMEDIA_VIDEO_POLL_SECS", "5"),
            ("GENMEDIA_VIDEO_TIMEOUT_SECS", "0"),
            ("GENMEDIA_REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(settings.gemini_api_key.as_deref(), Some("key-1"));
        assert_eq!(settings.api_base, "http://localhost:9000/v1beta");
        assert_eq!(settings.provider, ProviderKind::Dryrun);
        assert_eq!(settings.video_poll_interval, Duration::from_secs(5));
        assert_eq!(settings.video_timeout, Duration::from_secs(600));
        assert_eq!(settings.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn debug_output_redacts_key() {
        let settings = settings_from(&[("GEMINI_API_KEY", "super-secret")]);
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
