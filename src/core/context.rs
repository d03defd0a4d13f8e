//! Per-request correlation context.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use http::{Extensions, Request};
use tracing::Level;

use super::id::CorrelationId;
use super::request::RequestFacts;
use super::response::ResponseState;
use crate::logger::Logger;
use crate::record::{self, Message};

/// State shared by everything that logs on behalf of one request.
///
/// Exactly one context exists per request. It is created by the first
/// instrumentation layer that sees the request, stored in the request
/// extensions as `Arc<CorrelationContext>`, and dropped once the request,
/// its body and its response body are gone.
pub struct CorrelationContext {
    id: CorrelationId,
    arrived_at: Instant,
    started: AtomicBool,
    request: RequestFacts,
    response: ResponseState,
    user_id: OnceLock<String>,
    logger: Logger,
}

impl CorrelationContext {
    /// Create a context for a request observed now.
    pub fn new(request: RequestFacts, logger: Logger) -> Self {
        Self {
            id: CorrelationId::generate(),
            arrived_at: Instant::now(),
            started: AtomicBool::new(false),
            request,
            response: ResponseState::new(),
            user_id: OnceLock::new(),
            logger,
        }
    }

    #[inline]
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    #[inline]
    pub fn arrived_at(&self) -> Instant {
        self.arrived_at
    }

    /// Time since arrival. Monotonic, recomputed on every call.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.arrived_at.elapsed()
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Whether the arrival record has been emitted.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Flip `started` from false to true. Only one caller ever gets `true`.
    pub fn mark_started(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn request(&self) -> &RequestFacts {
        &self.request
    }

    #[inline]
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Attach the authenticated user id. The first id wins; returns whether
    /// this call set it.
    pub fn identify(&self, user_id: impl Into<String>) -> bool {
        self.user_id.set(user_id.into()).is_ok()
    }

    /// User id set through [`identify`](Self::identify), else the one known
    /// at arrival.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id
            .get()
            .map(String::as_str)
            .or_else(|| self.request.user_id())
    }

    #[inline]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Emit a record at the message's default level.
    pub fn log(&self, message: impl Into<Message>) {
        self.emit(message.into(), None);
    }

    /// Emit a record at an explicit level.
    pub fn log_at(&self, level: Level, message: impl Into<Message>) {
        self.emit(message.into(), Some(level));
    }

    fn emit(&self, message: Message, level: Option<Level>) {
        let (level, record) = record::build(self, message, level);
        self.logger.log(level, record);
    }
}

impl fmt::Debug for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationContext")
            .field("id", &self.id)
            .field("started", &self.is_started())
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("response_complete", &self.response.is_complete())
            .finish()
    }
}

/// Access to the correlation context from handlers.
pub trait CorrelationExt {
    fn correlation(&self) -> Option<&Arc<CorrelationContext>>;
}

impl CorrelationExt for Extensions {
    fn correlation(&self) -> Option<&Arc<CorrelationContext>> {
        self.get::<Arc<CorrelationContext>>()
    }
}

impl<B> CorrelationExt for Request<B> {
    fn correlation(&self) -> Option<&Arc<CorrelationContext>> {
        self.extensions().correlation()
    }
}
