//! Error hook layer.

use std::fmt;
use std::task::{Context, Poll};

use http::{Request, Response};
use hyper::body::Body;
use tower::{Layer, Service};

use super::body::ObservedBody;
use super::ensure;
use super::error_page::PendingResponse;
use super::future::ObservedFuture;
use crate::logger::Logger;

/// Logs service errors at ERROR and returns them unchanged.
///
/// Place it inside whatever turns errors into responses. The context is
/// created here when no [`LifecycleLayer`](super::LifecycleLayer) ran first,
/// in which case this layer observes the bodies as well. The response
/// rendered for an error is then only observed when the renderer is an
/// [`ErrorPageLayer`](super::ErrorPageLayer); a plain `map_result` outside
/// this layer is invisible to it.
#[derive(Clone, Debug)]
pub struct ErrorLayer {
    logger: Logger,
}

impl ErrorLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for ErrorLayer {
    type Service = ErrorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorService<S> {
    inner: S,
    logger: Logger,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ErrorService<S>
where
    S: Service<Request<ObservedBody<ReqBody>>, Response = Response<ResBody>>,
    S::Error: fmt::Display,
    ReqBody: Body,
    ResBody: Body,
{
    type Response = Response<ObservedBody<ResBody>>;
    type Error = S::Error;
    type Future = ObservedFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let (context, request_signal, response_signal) = ensure(&self.logger, &mut req).into_parts();
        let pending = req.extensions().get::<PendingResponse>().cloned();

        let req = req.map(|body| ObservedBody::new(body, request_signal));
        ObservedFuture::new(self.inner.call(req), context, response_signal, pending, true)
    }
}
