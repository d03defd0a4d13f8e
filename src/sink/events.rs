//! Sink forwarding records into `tracing`.

use serde_json::Map;
use tracing::{event, Level};

use super::{encode, Sink};
use crate::record::Entry;

/// Target of request record events.
pub const REQUEST_TARGET: &str = "reqtrail::request";

/// Emits each entry as a `tracing` event on [`REQUEST_TARGET`].
///
/// The event message is the entry's message; the encoded entry travels in
/// the `entry` field so a JSON formatter can lift it back out.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventSink;

impl EventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for EventSink {
    fn log(&self, level: Level, entry: &Entry) {
        let encoded = encode(level, entry, &Map::new());
        let message = entry.message();
        let correlation_id = entry.as_record().map(|r| r.correlation_id.as_str());

        macro_rules! emit {
            ($lvl:expr) => {
                event!(
                    target: REQUEST_TARGET,
                    $lvl,
                    correlation_id = correlation_id,
                    entry = %encoded,
                    "{}",
                    message
                )
            };
        }

        match level {
            Level::TRACE => emit!(Level::TRACE),
            Level::DEBUG => emit!(Level::DEBUG),
            Level::INFO => emit!(Level::INFO),
            Level::WARN => emit!(Level::WARN),
            Level::ERROR => emit!(Level::ERROR),
        }
    }
}
