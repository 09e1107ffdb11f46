use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Lines a generation run can log, in the order they normally appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestResolved,
    DispatchStarted,
    VideoPoll,
    DispatchFailed,
    ArtifactWritten,
    ReceiptWritten,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestResolved => "request_resolved",
            Self::DispatchStarted => "dispatch_started",
            Self::VideoPoll => "video_poll",
            Self::DispatchFailed => "dispatch_failed",
            Self::ArtifactWritten => "artifact_written",
            Self::ReceiptWritten => "receipt_written",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSONL log for one invocation.
///
/// Every line carries `type`, `run_id` and `ts`; payload keys are merged last
/// and may override them. The file is opened on the first event and clones
/// share the handle.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    run_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Shared {
                path: path.into(),
                run_id: run_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert("run_id".to_string(), Value::String(self.inner.run_id.clone()));
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut slot = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        if slot.is_none() {
            *slot = Some(self.open()?);
        }
        if let Some(file) = slot.as_mut() {
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        Ok(Value::Object(event))
    }

    /// Like [`EventWriter::emit`], for payloads built with `json!`.
    /// Non-object values are stored under `value`.
    pub fn emit_value(&self, kind: EventKind, payload: Value) -> anyhow::Result<Value> {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_string(), other)]),
        };
        self.emit(kind, payload)
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self
            .inner
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?)
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
