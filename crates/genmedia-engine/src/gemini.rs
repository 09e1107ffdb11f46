use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use genmedia_contracts::events::{EventKind, EventWriter};
use genmedia_contracts::models::VideoModel;
use genmedia_contracts::request::{InputImage, Resolution};
use genmedia_contracts::settings::Settings;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Map, Value};

use crate::{map_object, truncate_text, ClientOutput, HttpStatusError, MediaClient, ProgressFn};

pub const IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

/// Gemini image generation and Veo video generation over the public
/// Generative Language REST API.
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    http: HttpClient,
    poll_interval: Duration,
    video_timeout: Duration,
    events: Option<EventWriter>,
    progress: Option<ProgressFn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OperationState {
    Pending,
    Ready { uri: String },
}

impl GeminiClient {
    pub fn new(settings: &Settings, api_key: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: settings.api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
            poll_interval: settings.video_poll_interval,
            video_timeout: settings.video_timeout,
            events: None,
            progress: None,
        })
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    #[cfg(test)]
    fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, model, method)
    }

    fn post_json(&self, provider: &str, endpoint: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .with_context(|| format!("{provider} request failed ({endpoint})"))?;
        response_json_or_error(provider, response)
    }

    fn get_json(&self, provider: &str, url: &str) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .with_context(|| format!("{provider} request failed ({url})"))?;
        response_json_or_error(provider, response)
    }

    fn image_payload(prompt: &str, resolution: Resolution, input: Option<&InputImage>) -> Value {
        let mut parts = Vec::new();
        if let Some(input) = input {
            parts.push(json!({
                "inlineData": {
                    "mimeType": input.mime_type,
                    "data": BASE64.encode(&input.bytes),
                }
            }));
        }
        parts.push(json!({ "text": prompt }));
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "imageSize": resolution.as_str() },
            },
        })
    }

    /// Returns the first inline image and its MIME type.
    fn extract_image(response_payload: &Value) -> Result<(Vec<u8>, String)> {
        if let Some(reason) = response_payload
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            bail!("Gemini blocked the prompt ({reason})");
        }

        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut texts = Vec::new();
        for candidate in candidates {
            let parts = candidate
                .pointer("/content/parts")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for part in parts {
                let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
                let data = inline
                    .and_then(|inline| inline.get("data"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !data.is_empty() {
                    let bytes = BASE64
                        .decode(data.as_bytes())
                        .context("Gemini image base64 decode failed")?;
                    let mime_type = inline
                        .and_then(|inline| inline.get("mimeType").or_else(|| inline.get("mime_type")))
                        .and_then(Value::as_str)
                        .unwrap_or("image/png")
                        .to_string();
                    return Ok((bytes, mime_type));
                }
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        texts.push(text.trim().to_string());
                    }
                }
            }
        }

        if let Some(reason) = candidates
            .iter()
            .filter_map(|candidate| candidate.get("finishReason").and_then(Value::as_str))
            .find(|reason| BLOCKING_FINISH_REASONS.contains(reason))
        {
            bail!("Gemini stopped generation ({reason})");
        }
        if texts.is_empty() {
            bail!("Gemini returned no image");
        }
        bail!(
            "Gemini returned no image; model said: {}",
            truncate_text(&texts.join(" "), 512)
        );
    }

    fn video_payload(
        prompt: &str,
        negative_prompt: Option<&str>,
        input: Option<&InputImage>,
    ) -> Value {
        let mut instance = json!({ "prompt": prompt });
        if let Some(input) = input {
            instance["image"] = json!({
                "bytesBase64Encoded": BASE64.encode(&input.bytes),
                "mimeType": input.mime_type,
            });
        }
        let mut parameters = Map::new();
        if let Some(negative) = negative_prompt {
            parameters.insert(
                "negativePrompt".to_string(),
                Value::String(negative.to_string()),
            );
        }
        json!({
            "instances": [instance],
            "parameters": parameters,
        })
    }

    fn parse_operation(operation: &Value) -> Result<OperationState> {
        if let Some(error) = operation.get("error").filter(|value| !value.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            bail!("Veo operation failed: {message}");
        }
        if !operation.get("done").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(OperationState::Pending);
        }

        let response = operation
            .pointer("/response/generateVideoResponse")
            .cloned()
            .unwrap_or(Value::Null);
        if let Some(uri) = response
            .pointer("/generatedSamples/0/video/uri")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
        {
            return Ok(OperationState::Ready {
                uri: uri.trim().to_string(),
            });
        }

        let filtered = response
            .get("raiMediaFilteredCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if filtered > 0 {
            let reasons = response
                .get("raiMediaFilteredReasons")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default();
            if reasons.is_empty() {
                bail!("Veo filtered the generated video");
            }
            bail!("Veo filtered the generated video: {reasons}");
        }
        bail!("Veo operation finished without a video")
    }

    fn poll_operation(&self, name: &str) -> Result<(Value, String)> {
        let url = format!("{}/{}", self.api_base, name.trim_start_matches('/'));
        let started = Instant::now();
        let mut attempt: u64 = 0;
        loop {
            let operation = self
                .get_json("Veo poll", &url)
                .with_context(|| format!("Veo poll failed for {name}"))?;
            if let OperationState::Ready { uri } = Self::parse_operation(&operation)? {
                return Ok((operation, uri));
            }
            attempt += 1;
            let elapsed = started.elapsed();
            if elapsed >= self.video_timeout {
                bail!(
                    "Veo polling timed out after {:.0}s",
                    self.video_timeout.as_secs_f64()
                );
            }
            self.report_poll(name, attempt, elapsed);
            thread::sleep(self.poll_interval);
        }
    }

    /// Progress line and `video_poll` event; event log errors are dropped.
    fn report_poll(&self, operation: &str, attempt: u64, elapsed: Duration) {
        if let Some(progress) = &self.progress {
            progress(&format!(
                "Waiting for video generation... ({}s elapsed)",
                elapsed.as_secs()
            ));
        }
        if let Some(events) = &self.events {
            let _ = events.emit_value(
                EventKind::VideoPoll,
                json!({
                    "operation": operation,
                    "attempt": attempt,
                    "elapsed_s": elapsed.as_secs_f64(),
                }),
            );
        }
    }

    fn download_video(&self, uri: &str) -> Result<(Vec<u8>, String)> {
        let response = self
            .http
            .get(uri)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .map_err(reqwest::Error::without_url)
            .context("Veo video download failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(HttpStatusError {
                provider: "Veo download".to_string(),
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            }
            .into());
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|value| value.starts_with("video/"))
            .unwrap_or_else(|| "video/mp4".to_string());
        let bytes = response
            .bytes()
            .map_err(reqwest::Error::without_url)
            .context("failed reading Veo video bytes")?
            .to_vec();
        Ok((bytes, mime_type))
    }
}

impl MediaClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_image(
        &self,
        prompt: &str,
        resolution: Resolution,
        input: Option<&InputImage>,
    ) -> Result<ClientOutput> {
        let endpoint = self.model_endpoint(IMAGE_MODEL, "generateContent");
        let payload = Self::image_payload(prompt, resolution, input);
        let response_payload = self.post_json("Gemini", &endpoint, &payload)?;
        let (bytes, mime_type) = Self::extract_image(&response_payload)?;

        Ok(ClientOutput {
            bytes,
            mime_type,
            model: IMAGE_MODEL.to_string(),
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "payload": payload,
            })),
            provider_response: map_object(json!({
                "candidates": response_payload
                    .get("candidates")
                    .and_then(Value::as_array)
                    .map(|rows| rows.len())
                    .unwrap_or(0),
                "finish_reason": response_payload
                    .pointer("/candidates/0/finishReason")
                    .cloned()
                    .unwrap_or(Value::Null),
                "usage_metadata": response_payload
                    .get("usageMetadata")
                    .cloned()
                    .unwrap_or(Value::Null),
            })),
            warnings: Vec::new(),
        })
    }

    fn generate_video(
        &self,
        prompt: &str,
        model: VideoModel,
        negative_prompt: Option<&str>,
        input: Option<&InputImage>,
    ) -> Result<ClientOutput> {
        let endpoint = self.model_endpoint(model.id(), "predictLongRunning");
        let payload = Self::video_payload(prompt, negative_prompt, input);
        let started = self.post_json("Veo", &endpoint, &payload)?;
        let Some(name) = started
            .get("name")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
        else {
            bail!("Veo returned no operation name: {}", truncate_text(&started.to_string(), 512));
        };

        if let Some(progress) = &self.progress {
            progress(&format!("Started {} operation {name}", model.id()));
        }
        let (operation, uri) = self.poll_operation(name)?;
        let (bytes, mime_type) = self.download_video(&uri)?;

        Ok(ClientOutput {
            bytes,
            mime_type,
            model: model.id().to_string(),
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "payload": payload,
            })),
            provider_response: map_object(json!({
                "operation": name,
                "done": operation.get("done").cloned().unwrap_or(Value::Null),
                "video_uri": uri,
            })),
            warnings: Vec::new(),
        })
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        return Err(HttpStatusError {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: truncate_text(&body, 512),
        }
        .into());
    }
    serde_json::from_str(&body).with_context(|| format!("{provider} returned invalid JSON payload"))
}
