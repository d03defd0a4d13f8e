//! Correlation identifiers.
//!
//! Ids are UUIDv7: a 48-bit millisecond timestamp followed by random bits,
//! rendered as the lowercase hyphenated string. The timestamp prefix makes
//! ids sort by creation time, both as values and as strings.

use std::fmt;

use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Encoded length in characters.
pub const ID_LEN: usize = uuid::fmt::Hyphenated::LENGTH;

/// Unique, time-sortable request identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId {
    uuid: Uuid,
    buf: [u8; ID_LEN],
}

impl CorrelationId {
    /// Generate a fresh id for the current instant.
    pub fn generate() -> Self {
        Self::from_uuid(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        let mut buf = [0u8; ID_LEN];
        uuid.hyphenated().encode_lower(&mut buf);
        Self { uuid, buf }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.uuid
    }

    /// Millisecond timestamp embedded in the id, if it carries one.
    pub fn timestamp_millis(&self) -> Option<u64> {
        self.uuid.get_timestamp().map(|ts| {
            let (secs, nanos) = ts.to_unix();
            secs * 1_000 + u64::from(nanos / 1_000_000)
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf).unwrap_or("")
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CorrelationId").field(&self.as_str()).finish()
    }
}

impl Serialize for CorrelationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
