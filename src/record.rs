//! Structured log records.
//!
//! A [`LogRecord`] is a point-in-time snapshot of one request: it is built
//! in a single synchronous pass from the [`CorrelationContext`] and the
//! [`metadata`](crate::metadata) readers, handed to the sink and never
//! touched again.
//!
//! ```json
//! {"correlationId":"01JG4Z6N3T8Q0VXR2M5KD7HWPA","timestamp":"2024-12-28T15:04:05.123Z",
//!  "url":"/orders?page=2","hostname":"api.example.com","protocol":"https","httpVersion":"2.0",
//!  "method":"GET","remoteAddress":"203.0.113.7","userAgent":"curl/8.0","referrer":"",
//!  "userId":null,"contentLength":null,"statusCode":null,"elapsedMillis":0.08,
//!  "responseTimeMillis":null,"message":"request received","level":"info"}
//! ```

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::Level;

use crate::core::{CorrelationContext, CorrelationId, Iso8601Timestamp};
use crate::metadata;

/// Lowercase level name used in every serialized line.
pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Record payload.
///
/// The variant decides the default level: INFO for text, ERROR for errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Error(String),
}

impl Message {
    /// Error payload from anything displayable.
    pub fn error(err: &(impl fmt::Display + ?Sized)) -> Self {
        Message::Error(err.to_string())
    }

    pub fn default_level(&self) -> Level {
        match self {
            Message::Text(_) => Level::INFO,
            Message::Error(_) => Level::ERROR,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Message::Text(s) | Message::Error(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error(_))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Message::Text(s) => serializer.serialize_str(s),
            Message::Error(s) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", s)?;
                map.end()
            }
        }
    }
}

/// One request log line.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub correlation_id: CorrelationId,
    pub timestamp: Iso8601Timestamp,
    pub url: String,
    pub hostname: Option<String>,
    pub protocol: &'static str,
    pub http_version: &'static str,
    pub method: String,
    pub remote_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: String,
    pub user_id: Option<String>,
    pub content_length: Option<u64>,
    pub status_code: Option<u16>,
    pub elapsed_millis: f64,
    pub response_time_millis: Option<f64>,
    pub message: Message,
    #[serde(serialize_with = "serialize_level")]
    pub level: Level,
}

fn serialize_level<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(level_name(*level))
}

/// Build a record for `ctx` as it stands now.
///
/// `level` overrides the message's default level.
pub fn build(ctx: &CorrelationContext, message: Message, level: Option<Level>) -> (Level, LogRecord) {
    let level = level.unwrap_or_else(|| message.default_level());
    let req = ctx.request();
    let res = ctx.response();

    // Completion is read once so the three response fields agree.
    let complete = metadata::is_complete(res);

    let record = LogRecord {
        correlation_id: ctx.id().clone(),
        timestamp: Iso8601Timestamp::now(),
        url: metadata::url(req),
        hostname: metadata::hostname(req),
        protocol: metadata::protocol(req),
        http_version: metadata::http_version(req),
        method: req.method().to_string(),
        remote_address: metadata::remote_address(req),
        user_agent: metadata::user_agent(req).map(str::to_string),
        referrer: metadata::referrer(req).to_string(),
        user_id: ctx.user_id().map(str::to_string),
        content_length: complete.then(|| metadata::content_length(res)).flatten(),
        status_code: complete.then(|| metadata::status_code(res)).flatten(),
        elapsed_millis: metadata::elapsed(ctx),
        response_time_millis: complete.then(|| metadata::response_time(res)).flatten(),
        message,
        level,
    };

    (level, record)
}

/// What a sink receives: a bare line or a full record.
#[derive(Clone, Debug)]
pub enum Entry {
    Text(String),
    Record(Box<LogRecord>),
}

impl Entry {
    /// JSON object form. Bare text becomes `{"message": ...}`.
    pub fn to_object(&self) -> Map<String, Value> {
        match self {
            Entry::Text(s) => {
                let mut map = Map::new();
                map.insert("message".into(), Value::String(s.clone()));
                map
            }
            Entry::Record(record) => match serde_json::to_value(record) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
        }
    }

    pub fn as_record(&self) -> Option<&LogRecord> {
        match self {
            Entry::Record(record) => Some(record),
            Entry::Text(_) => None,
        }
    }

    /// Message text of either form.
    pub fn message(&self) -> &str {
        match self {
            Entry::Text(s) => s,
            Entry::Record(record) => record.message.as_str(),
        }
    }
}

impl From<&str> for Entry {
    fn from(s: &str) -> Self {
        Entry::Text(s.to_string())
    }
}

impl From<String> for Entry {
    fn from(s: String) -> Self {
        Entry::Text(s)
    }
}

impl From<LogRecord> for Entry {
    fn from(record: LogRecord) -> Self {
        Entry::Record(Box::new(record))
    }
}
