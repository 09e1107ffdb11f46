use std::sync::Arc;

use anyhow::{bail, Result};
use genmedia_contracts::events::EventWriter;
use genmedia_contracts::models::VideoModel;
use genmedia_contracts::request::{Credential, InputImage, Resolution};
use genmedia_contracts::settings::{ProviderKind, Settings};
use serde_json::{Map, Value};

mod dispatch;
mod dryrun;
mod gemini;

pub use dispatch::{
    dispatch, estimate_video_cost_usd, write_artifact, DispatchOutcome, Dispatcher, MediaArtifact,
};
pub use dryrun::DryrunClient;
pub use gemini::{GeminiClient, IMAGE_MODEL};

/// Progress line sink for long-running video jobs.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// What a media client hands back for one artifact.
#[derive(Debug, Clone, Default)]
pub struct ClientOutput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub model: String,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub warnings: Vec<String>,
}

/// The external generation service, seen through its request/response
/// contract. Implementations do not retry.
pub trait MediaClient: Send + Sync {
    fn name(&self) -> &str;

    fn generate_image(
        &self,
        prompt: &str,
        resolution: Resolution,
        input: Option<&InputImage>,
    ) -> Result<ClientOutput>;

    fn generate_video(
        &self,
        prompt: &str,
        model: VideoModel,
        negative_prompt: Option<&str>,
        input: Option<&InputImage>,
    ) -> Result<ClientOutput>;
}

/// Non-2xx answer from an upstream endpoint.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider} request failed ({status}): {body}")]
pub struct HttpStatusError {
    pub provider: String,
    pub status: u16,
    pub body: String,
}

impl HttpStatusError {
    pub fn is_transient(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

/// Builds the client configured in `settings`.
pub fn client_for(
    settings: &Settings,
    credential: &Credential,
    events: Option<EventWriter>,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn MediaClient>> {
    match settings.provider {
        ProviderKind::Dryrun => Ok(Box::new(DryrunClient)),
        ProviderKind::Gemini => {
            let Some(api_key) = credential.api_key() else {
                bail!("the gemini client needs an API key");
            };
            let mut client = GeminiClient::new(settings, api_key)?;
            if let Some(events) = events {
                client = client.with_events(events);
            }
            if let Some(progress) = progress {
                client = client.with_progress(progress);
            }
            Ok(Box::new(client))
        }
    }
}

pub(crate) fn is_retryable_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(reqwest_err) = cause.downcast_ref::<reqwest::Error>() {
            return reqwest_err.is_timeout() || reqwest_err.is_connect() || reqwest_err.is_request();
        }
        cause
            .downcast_ref::<HttpStatusError>()
            .is_some_and(HttpStatusError::is_transient)
    })
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use genmedia_contracts::request::Credential;
    use genmedia_contracts::settings::{ProviderKind, Settings};

    use super::{client_for, error_chain_text, is_retryable_error, truncate_text, HttpStatusError};

    #[test]
    fn client_for_picks_configured_provider() -> anyhow::Result<()> {
        let dryrun = Settings::default().with_provider(ProviderKind::Dryrun);
        assert_eq!(client_for(&dryrun, &Credential::Offline, None, None)?.name(), "dryrun");

        let gemini = Settings::default();
        let client = client_for(&gemini, &Credential::Environment("k".to_string()), None, None)?;
        assert_eq!(client.name(), "gemini");

        assert!(client_for(&gemini, &Credential::Offline, None, None).is_err());
        Ok(())
    }

    #[test]
    fn status_errors_are_retryable_only_when_transient() {
        let throttled = anyhow::Error::new(HttpStatusError {
            provider: "Gemini".to_string(),
            status: 429,
            body: "quota".to_string(),
        });
        assert!(is_retryable_error(&throttled));

        let rejected = anyhow::Error::new(HttpStatusError {
            provider: "Gemini".to_string(),
            status: 400,
            body: "bad request".to_string(),
        })
        .context("Gemini image request failed");
        assert!(!is_retryable_error(&rejected));
        assert!(!is_retryable_error(&anyhow::anyhow!("no image returned")));
    }

    #[test]
    fn error_chain_text_joins_causes() {
        let err = Err::<(), _>(anyhow::anyhow!("socket closed"))
            .context("Veo poll failed")
            .unwrap_err();
        assert_eq!(
            error_chain_text(&err, 200),
            "Veo poll failed | caused by: socket closed"
        );
        assert_eq!(error_chain_text(&err, 4), "Veo …");
    }

    #[test]
    fn truncate_text_keeps_short_values() {
        assert_eq!(truncate_text("abc", 3), "abc");
        assert_eq!(truncate_text("abcd", 3), "abc…");
    }
}
