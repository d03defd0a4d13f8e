//! Record sinks.
//!
//! A sink receives `(level, entry)` pairs and is shared by every in-flight
//! request, so implementations must accept concurrent calls and write each
//! entry as one independent unit.
//!
//! - [`ConsoleSink`] - JSON lines on stdout
//! - [`LogstashSink`] - JSON lines over TCP
//! - [`EventSink`] - `tracing` events on the `reqtrail::request` target
//! - [`FanoutSink`] - several sinks at once
//! - [`MemorySink`] - in-memory capture for tests

mod console;
mod events;
mod logstash;
mod memory;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::Level;

use crate::record::{level_name, Entry};

pub use console::ConsoleSink;
pub use events::{EventSink, REQUEST_TARGET};
pub use logstash::LogstashSink;
pub use memory::MemorySink;

/// Backend receiving log entries.
pub trait Sink: Send + Sync {
    fn log(&self, level: Level, entry: &Entry);
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn log(&self, level: Level, entry: &Entry) {
        (**self).log(level, entry)
    }
}

/// Encode an entry as one JSON line (without the newline).
///
/// `level` is added to bare text entries, and `fields` are merged without
/// overriding keys the entry already has.
pub fn encode(level: Level, entry: &Entry, fields: &Map<String, Value>) -> String {
    let mut object = entry.to_object();
    object
        .entry("level")
        .or_insert_with(|| Value::String(level_name(level).to_string()));
    for (key, value) in fields {
        if !object.contains_key(key) {
            object.insert(key.clone(), value.clone());
        }
    }
    Value::Object(object).to_string()
}

/// Forwards every entry to each of its sinks, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn push(&mut self, sink: impl Sink + 'static) {
        self.sinks.push(Arc::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for FanoutSink {
    fn log(&self, level: Level, entry: &Entry) {
        for sink in &self.sinks {
            sink.log(level, entry);
        }
    }
}
