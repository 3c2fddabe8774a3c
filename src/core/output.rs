//! CLI output: text vs JSON, and the JSON envelope every command prints
//! under `--format json`.

use crate::core::error::QrtagError;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

pub const ENVELOPE_SCHEMA: &str = "qrtag.envelope/1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = QrtagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(QrtagError::ValidationError(format!(
                "unknown output format {:?} (expected 'text' or 'json')",
                other
            ))),
        }
    }
}

/// One command result. Body fields sit next to the header fields so scripts
/// can read `.payload` or `.path` directly.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema: &'static str,
    pub qrtag_version: &'static str,
    pub cmd: String,
    pub status: String,
    /// Unix seconds.
    pub at: u64,
    pub event_id: String,
    #[serde(flatten)]
    pub body: Map<String, JsonValue>,
}

impl Envelope {
    /// Non-object bodies land under a `"body"` key.
    pub fn new(cmd: &str, status: &str, body: JsonValue) -> Self {
        let body = match body {
            JsonValue::Object(map) => map,
            JsonValue::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("body".to_string(), other);
                map
            }
        };
        let at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            schema: ENVELOPE_SCHEMA,
            qrtag_version: env!("CARGO_PKG_VERSION"),
            cmd: cmd.to_string(),
            status: status.to_string(),
            at,
            event_id: Ulid::new().to_string(),
            body,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&line)
    }
}

/// Payload for the one-line text summary. Long payloads are cut on a char
/// boundary and report how many bytes were left out.
pub fn payload_preview(payload: &str, max_chars: usize) -> String {
    match payload.char_indices().nth(max_chars) {
        None => payload.to_string(),
        Some((cut, _)) => format!("{}... (+{} bytes)", &payload[..cut], payload.len() - cut),
    }
}
