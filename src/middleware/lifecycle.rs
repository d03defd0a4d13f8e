//! Normal instrumentation layer.

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

/// Emits the arrival record and observes both bodies of every request.
///
/// Running it twice on one request is harmless: the second pass finds the
/// context, emits nothing and passes the request on.
#[derive(Clone, Debug)]
pub struct LifecycleLayer {
    logger: Logger,
}

impl LifecycleLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for LifecycleLayer {
    type Service = LifecycleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LifecycleService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LifecycleService<S> {
    inner: S,
    logger: Logger,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LifecycleService<S>
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

        if context.mark_started() {
            context.log("request received");
        }

        let req = req.map(|body| ObservedBody::request(body, request_signal));
        ObservedFuture::new(self.inner.call(req), context, response_signal, pending, false)
    }
}
