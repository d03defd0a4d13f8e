//! In-memory sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Level;

use super::Sink;
use crate::record::{Entry, LogRecord};

/// Keeps every entry in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(Level, Entry)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Level, Entry)>> {
        // A panicking test thread must not hide what was logged
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<(Level, Entry)> {
        self.lock().clone()
    }

    /// Structured records only, with their levels.
    pub fn records(&self) -> Vec<(Level, LogRecord)> {
        self.lock()
            .iter()
            .filter_map(|(level, entry)| entry.as_record().map(|r| (*level, r.clone())))
            .collect()
    }

    /// Message text of every entry.
    pub fn messages(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|(_, entry)| entry.message().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Sink for MemorySink {
    fn log(&self, level: Level, entry: &Entry) {
        self.lock().push((level, entry.clone()));
    }
}
