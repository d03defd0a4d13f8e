//! Error page stage.
//!
//! Turns service errors into responses. Sits outside an
//! [`ErrorLayer`](super::ErrorLayer) so the error is logged before it is
//! rendered:
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .layer(ErrorPageLayer::new(|_err: HandlerError| internal_error()))
//!     .layer(logger.error_layer())
//!     .service_fn(handle);
//! ```
//!
//! When the error layer below created the context, the rendered response is
//! observed like any other and gets its `response finished` record.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};

use http::{Request, Response};
use http_body_util::Either;
use hyper::body::Body;
use pin_project::pin_project;
use tower::{Layer, Service};

use super::body::ObservedBody;
use super::future::observe_response;
use super::signal::{Channel, CompletionSignal};

/// Slot for the response signal of a failed request, shared through the
/// request extensions.
#[derive(Clone, Default)]
pub(crate) struct PendingResponse(Arc<Mutex<Option<CompletionSignal>>>);

impl PendingResponse {
    pub(crate) fn put(&self, signal: CompletionSignal) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
    }

    pub(crate) fn take(&self) -> Option<CompletionSignal> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Renders service errors with `render`.
#[derive(Clone, Debug)]
pub struct ErrorPageLayer<F> {
    render: F,
}

impl<F> ErrorPageLayer<F> {
    pub fn new(render: F) -> Self {
        Self { render }
    }
}

impl<S, F: Clone> Layer<S> for ErrorPageLayer<F> {
    type Service = ErrorPageService<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorPageService {
            inner,
            render: self.render.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorPageService<S, F> {
    inner: S,
    render: F,
}

impl<S, F, ReqBody, ResBody, ErrBody> Service<Request<ReqBody>> for ErrorPageService<S, F>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    F: Fn(S::Error) -> Response<ErrBody> + Clone,
    ErrBody: Body,
{
    type Response = Response<Either<ResBody, ObservedBody<ErrBody>>>;
    type Error = S::Error;
    type Future = ErrorPageFuture<S::Future, F>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let pending = PendingResponse::default();
        req.extensions_mut().insert(pending.clone());

        ErrorPageFuture {
            inner: self.inner.call(req),
            render: self.render.clone(),
            pending,
        }
    }
}

#[pin_project]
pub struct ErrorPageFuture<Fut, F> {
    #[pin]
    inner: Fut,
    render: F,
    pending: PendingResponse,
}

impl<Fut, F, ResBody, ErrBody, E> Future for ErrorPageFuture<Fut, F>
where
    Fut: Future<Output = Result<Response<ResBody>, E>>,
    F: Fn(E) -> Response<ErrBody>,
    ErrBody: Body,
{
    type Output = Result<Response<Either<ResBody, ObservedBody<ErrBody>>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let response = match ready!(this.inner.poll(cx)) {
            Ok(response) => response.map(Either::Left),
            Err(e) => {
                let signal = this
                    .pending
                    .take()
                    .unwrap_or_else(|| CompletionSignal::disarmed(Channel::Response));
                observe_response((this.render)(e), signal).map(Either::Right)
            }
        };

        Poll::Ready(Ok(response))
    }
}
