//! NDJSON frame helpers: type-tag extraction and order-preserving field
//! injection.
//!
//! The wire contract is the JSON shape, not the parsing mechanism: this
//! uses a full parse-mutate-reserialize pass rather than a regex-based
//! type-tag scan. `serde_json::Map` built with the `preserve_order` feature
//! means fields we inject stay in the position we put them, and a string
//! value that happens to contain the substring `"type"` can never be
//! mistaken for the key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a json object")]
    NotAnObject,
}

/// A decoded NDJSON line, still as an untyped object so unknown fields
/// survive being forwarded unchanged.
pub struct Frame {
    pub object: Map<String, Value>,
}

impl Frame {
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(line)?;
        match value {
            Value::Object(object) => Ok(Frame { object }),
            _ => Err(DecodeError::NotAnObject),
        }
    }

    /// The `"type"` field, if present and a string.
    pub fn message_type(&self) -> Option<&str> {
        self.object.get("type").and_then(Value::as_str)
    }

    pub fn serialize(&self) -> String {
        Value::Object(self.object.clone()).to_string()
    }
}

/// Insert `entries` at the front of the outer object, preserving the
/// relative order of `entries` themselves and of the fields already
/// present. Used for `resize`/`plotIndex` injection into relayed frames
/// immediately after the outer `{`.
pub fn prepend_entries(object: &mut Map<String, Value>, entries: Vec<(&str, Value)>) {
    let mut rebuilt = Map::with_capacity(object.len() + entries.len());
    for (key, value) in entries {
        rebuilt.insert(key.to_owned(), value);
    }
    for (key, value) in std::mem::take(object) {
        rebuilt.insert(key, value);
    }
    *object = rebuilt;
}

/// Insert `entries` immediately after `"<key>":{` inside a nested object
/// field, preserving order the same way `prepend_entries` does for the
/// outer object. Used to inject `sessionId` into `frame.plot`.
pub fn prepend_entries_in(object: &mut Map<String, Value>, key: &str, entries: Vec<(&str, Value)>) {
    if let Some(Value::Object(nested)) = object.get_mut(key) {
        prepend_entries(nested, entries);
    }
}

/// The deferred welcome: `serverInfo.httpUrl` tells a producer
/// where the viewer HTML lives, `transport` names which listener it
/// connected on.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "type")]
    pub kind: ServerInfoKind,
    #[serde(rename = "serverName")]
    pub server_name: String,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
    pub transport: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfoDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerInfoDetail {
    #[serde(rename = "httpUrl")]
    pub http_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerInfoKind {
    ServerInfo,
}

impl ServerInfo {
    pub fn new(transport: impl Into<String>, http_url: impl Into<String>) -> Self {
        ServerInfo {
            kind: ServerInfoKind::ServerInfo,
            server_name: "jgd-http-server".to_owned(),
            protocol_version: 1,
            transport: transport.into(),
            server_info: ServerInfoDetail {
                http_url: http_url.into(),
            },
        }
    }

    pub fn to_ndjson_line(&self) -> String {
        serde_json::to_string(self).expect("ServerInfo always serializes")
    }
}

/// The zero-valued fallback sent to a producer when its `metrics_request`
/// either times out or has no viewers to answer it.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponseFallback {
    #[serde(rename = "type")]
    pub kind: MetricsResponseKind,
    pub id: Value,
    pub width: i64,
    pub ascent: i64,
    pub descent: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsResponseKind {
    MetricsResponse,
}

impl MetricsResponseFallback {
    pub fn zero(id: Value) -> Self {
        MetricsResponseFallback {
            kind: MetricsResponseKind::MetricsResponse,
            id,
            width: 0,
            ascent: 0,
            descent: 0,
        }
    }

    pub fn to_ndjson_line(&self) -> String {
        serde_json::to_string(self).expect("MetricsResponseFallback always serializes")
    }
}
