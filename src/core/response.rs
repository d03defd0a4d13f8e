//! Response readiness state.
//!
//! The response is handed to the transport and consumed, so the context keeps
//! what the records need: the head as it left the service stack, a meter of
//! body bytes handed to the transport, and the completion instant. Readiness
//! is one-way: `PENDING -> COMPLETE`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use http::header::CONTENT_LENGTH;
use http::{HeaderMap, StatusCode};

/// Status line and declared length of the response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    /// Value of the finalized `Content-Length` header, if any.
    pub content_length: Option<u64>,
}

impl ResponseHead {
    pub fn new(status: StatusCode, headers: &HeaderMap) -> Self {
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Self {
            status,
            content_length,
        }
    }
}

/// Response side state of one request.
#[derive(Debug, Default)]
pub struct ResponseState {
    head: OnceLock<ResponseHead>,
    sent_bytes: AtomicU64,
    /// Elapsed milliseconds at completion.
    completed: OnceLock<f64>,
}

impl ResponseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the head handed to the transport. Only the first call counts.
    pub fn record_head(&self, status: StatusCode, headers: &HeaderMap) {
        let _ = self.head.set(ResponseHead::new(status, headers));
    }

    /// Count body bytes handed to the transport.
    #[inline]
    pub fn add_sent(&self, bytes: u64) {
        self.sent_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Mark the response fully sent. Returns `false` if it already was.
    pub fn mark_complete(&self, elapsed_ms: f64) -> bool {
        self.completed.set(elapsed_ms).is_ok()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed.get().is_some()
    }

    #[inline]
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.get()
    }

    #[inline]
    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes.load(Ordering::Relaxed)
    }

    /// Elapsed milliseconds at completion, if complete.
    #[inline]
    pub fn completed_at_ms(&self) -> Option<f64> {
        self.completed.get().copied()
    }
}
