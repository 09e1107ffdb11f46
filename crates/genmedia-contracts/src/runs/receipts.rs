use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::request::CanonicalRequest;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// What was written, by whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub path: String,
    pub mime_type: String,
    pub bytes: u64,
    pub sha256: String,
    pub provider: String,
    pub model: String,
    pub elapsed_ms: u64,
}

/// Inline media and credential fields, matched case-insensitively.
const REDACTED_KEYS: &[&str] = &[
    "data",
    "bytesbase64encoded",
    "b64_json",
    "image_bytes",
    "key",
    "api_key",
    "x-goog-api-key",
];

const REDACTED: &str = "<omitted>";

pub fn build_receipt(
    request: &CanonicalRequest,
    artifact: &ArtifactRecord,
    provider_request: &Map<String, Value>,
    provider_response: &Map<String, Value>,
    warnings: &[String],
) -> Value {
    let mut receipt = json!({
        "schema_version": RECEIPT_SCHEMA_VERSION,
        "request": request.summary(),
        "provider_request": provider_request,
        "provider_response": provider_response,
        "warnings": warnings,
        "artifact": artifact,
    });
    redact(&mut receipt);
    receipt
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut body = serde_json::to_vec_pretty(payload)?;
    body.push(b'\n');
    fs::write(path, body)?;
    Ok(())
}

fn redact(value: &mut Value) {
    match value {
        Value::Array(rows) => rows.iter_mut().for_each(redact),
        Value::Object(map) => {
            for (key, row) in map.iter_mut() {
                if REDACTED_KEYS
                    .iter()
                    .any(|redacted| key.eq_ignore_ascii_case(redacted))
                {
                    *row = Value::String(REDACTED.to_string());
                } else {
                    redact(row);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{build_receipt, write_receipt, ArtifactRecord, RECEIPT_SCHEMA_VERSION};
    use crate::request::{validate, GenerationRequest};
    use crate::settings::{ProviderKind, Settings};

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn receipt_has_expected_shape_and_omits_inline_data() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image_path = temp.path().join("out.png");
        let receipt_path = temp.path().join("receipts").join("out.json");

        let settings = Settings::default().with_provider(ProviderKind::Dryrun);
        let request = validate(&GenerationRequest::new("hello", &image_path), &settings)?;
        let artifact = ArtifactRecord {
            path: image_path.to_string_lossy().to_string(),
            mime_type: "image/png".to_string(),
            bytes: 3,
            sha256: "abc".to_string(),
            provider: "dryrun".to_string(),
            model: "dryrun-image".to_string(),
            elapsed_ms: 4,
        };
        let provider_request = as_map(json!({
            "endpoint": "dryrun",
            "payload": {
                "contents": [{ "parts": [{ "inlineData": { "mimeType": "image/png", "data": "iVBOR" } }] }],
                "key": "secret",
            }
        }));
        let provider_response = as_map(json!({ "status": "ok" }));

        let payload = build_receipt(
            &request,
            &artifact,
            &provider_request,
            &provider_response,
            &["note".to_string()],
        );
        write_receipt(&receipt_path, &payload)?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&receipt_path)?)?;
        assert_eq!(parsed["schema_version"], json!(RECEIPT_SCHEMA_VERSION));
        assert_eq!(parsed["request"]["prompt"], "hello");
        assert_eq!(parsed["request"]["resolution"], "1K");
        assert_eq!(parsed["artifact"]["sha256"], "abc");
        assert_eq!(parsed["warnings"][0], "note");
        assert_eq!(
            parsed["provider_request"]["payload"]["contents"][0]["parts"][0]["inlineData"]["data"],
            "<omitted>"
        );
        assert_eq!(parsed["provider_request"]["payload"]["key"], "<omitted>");
        assert!(!parsed.to_string().contains("iVBOR"));
        Ok(())
    }
}
