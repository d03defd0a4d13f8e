//! Request lifecycle instrumentation as `tower` layers.
//!
//! ```rust,ignore
//! let logger = Logger::from_config(&config.sink)?;
//!
//! let service = ServiceBuilder::new()
//!     .layer(logger.layer())
//!     .layer(ErrorPageLayer::new(render_error))
//!     .layer(logger.error_layer())
//!     .service_fn(handle);
//! ```
//!
//! For every request the layers emit:
//!
//! - `request received` when the first [`LifecycleLayer`] sees it
//! - `request finished` when the request body ends or is dropped unread
//! - `response finished` when the response body ends
//! - an ERROR record before the terminal record of a stream that failed
//! - an ERROR record from [`ErrorLayer`] for each service error

mod body;
mod error_hook;
mod error_page;
mod future;
mod lifecycle;
mod signal;

use std::sync::Arc;

use http::Request;

pub use body::ObservedBody;
pub use error_hook::{ErrorLayer, ErrorService};
pub use error_page::{ErrorPageFuture, ErrorPageLayer, ErrorPageService};
pub use future::ObservedFuture;
pub use lifecycle::{LifecycleLayer, LifecycleService};
pub use signal::{Channel, CompletionSignal};

use crate::core::{CorrelationContext, RequestFacts};
use crate::logger::Logger;

/// Result of [`ensure`].
#[derive(Debug)]
pub struct Ensured {
    context: Arc<CorrelationContext>,
    request_signal: CompletionSignal,
    response_signal: CompletionSignal,
}

impl Ensured {
    pub fn context(&self) -> &Arc<CorrelationContext> {
        &self.context
    }

    /// Whether this call created the context. Only then are the signals
    /// armed.
    pub fn created(&self) -> bool {
        self.request_signal.is_armed()
    }

    pub fn into_parts(self) -> (Arc<CorrelationContext>, CompletionSignal, CompletionSignal) {
        (self.context, self.request_signal, self.response_signal)
    }
}

/// Return the request's context, creating it on first touch.
///
/// The created context is stored in the request extensions, so later calls
/// return the same `Arc` and disarmed signals.
pub fn ensure<B>(logger: &Logger, req: &mut Request<B>) -> Ensured {
    if let Some(context) = req.extensions().get::<Arc<CorrelationContext>>() {
        return Ensured {
            context: Arc::clone(context),
            request_signal: CompletionSignal::disarmed(Channel::Request),
            response_signal: CompletionSignal::disarmed(Channel::Response),
        };
    }

    let context = Arc::new(CorrelationContext::new(
        RequestFacts::capture(req),
        logger.clone(),
    ));
    req.extensions_mut().insert(Arc::clone(&context));

    Ensured {
        request_signal: CompletionSignal::armed(Arc::clone(&context), Channel::Request),
        response_signal: CompletionSignal::armed(Arc::clone(&context), Channel::Response),
        context,
    }
}
