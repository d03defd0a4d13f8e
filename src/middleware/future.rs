//! Response future of the instrumentation services.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use http::{Method, Response, StatusCode};
use hyper::body::Body;
use pin_project::pin_project;

use super::body::ObservedBody;
use super::error_page::PendingResponse;
use super::signal::{Channel, CompletionSignal};
use crate::core::CorrelationContext;
use crate::record::Message;

/// Records the response head and wraps the response body.
///
/// With `report_errors` set, a service error is logged at ERROR before it
/// is returned unchanged. On error an armed response signal is handed to the
/// enclosing [`ErrorPageLayer`](super::ErrorPageLayer), if any, which observes
/// the response it renders.
#[pin_project]
pub struct ObservedFuture<F> {
    #[pin]
    inner: F,
    context: Arc<CorrelationContext>,
    response_signal: Option<CompletionSignal>,
    pending: Option<PendingResponse>,
    report_errors: bool,
}

impl<F> ObservedFuture<F> {
    pub(crate) fn new(
        inner: F,
        context: Arc<CorrelationContext>,
        response_signal: CompletionSignal,
        pending: Option<PendingResponse>,
        report_errors: bool,
    ) -> Self {
        Self {
            inner,
            context,
            response_signal: Some(response_signal),
            pending,
            report_errors,
        }
    }
}

impl<F, ResBody, E> Future for ObservedFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: Body,
    E: fmt::Display,
{
    type Output = Result<Response<ObservedBody<ResBody>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));

        match result {
            Ok(response) => {
                let signal = this
                    .response_signal
                    .take()
                    .unwrap_or_else(|| CompletionSignal::disarmed(Channel::Response));
                Poll::Ready(Ok(observe_response(response, signal)))
            }
            Err(e) => {
                if *this.report_errors {
                    this.context.log(Message::error(&e));
                }
                if let Some(signal) = this.response_signal.take() {
                    match this.pending.take() {
                        Some(pending) if signal.is_armed() => pending.put(signal),
                        _ => signal.cancel(),
                    }
                }
                Poll::Ready(Err(e))
            }
        }
    }
}

/// Record the head of `response` and wrap its body in `signal`.
pub(crate) fn observe_response<B: Body>(
    response: Response<B>,
    signal: CompletionSignal,
) -> Response<ObservedBody<B>> {
    let contentless = match signal.context() {
        Some(ctx) => {
            ctx.response()
                .record_head(response.status(), response.headers());
            is_contentless(ctx.request().method(), response.status())
        }
        None => false,
    };

    response.map(|body| {
        let body = ObservedBody::new(body, signal);
        if contentless {
            body.finish_on_drop()
        } else {
            body
        }
    })
}

/// Responses the transport sends without a body.
fn is_contentless(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}
