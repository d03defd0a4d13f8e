//! Console sink.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, Level};

use super::{encode, Sink};
use crate::record::Entry;

enum Target {
    Stdout,
    Writer(Mutex<Box<dyn Write + Send>>),
}

/// Writes one JSON object per line.
pub struct ConsoleSink {
    fields: Map<String, Value>,
    target: Target,
}

impl ConsoleSink {
    /// Sink writing to stdout.
    pub fn stdout() -> Self {
        Self {
            fields: Map::new(),
            target: Target::Stdout,
        }
    }

    /// Sink writing to an arbitrary writer.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            fields: Map::new(),
            target: Target::Writer(Mutex::new(Box::new(writer))),
        }
    }

    /// Static fields merged into every line.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = fields;
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl Sink for ConsoleSink {
    fn log(&self, level: Level, entry: &Entry) {
        let line = encode(level, entry, &self.fields);
        let written = match &self.target {
            Target::Stdout => writeln!(io::stdout().lock(), "{}", line),
            Target::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                writeln!(writer, "{}", line)
            }
        };
        // Closed pipe and the like; the record is lost, the request goes on
        if let Err(e) = written {
            debug!(error = %e, "console sink write failed");
        }
    }
}
