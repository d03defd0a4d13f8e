//! Test helpers and utilities

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame, Incoming};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use reqtrail::core::ConnectionInfo;
use reqtrail::sink::MemorySink;
use reqtrail::{CorrelationExt, ErrorPageLayer, LogRecord, Logger, ObservedBody};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::Level;

/// Logger writing into a fresh memory sink.
pub fn memory_logger() -> (Logger, MemorySink) {
    let sink = MemorySink::new();
    (Logger::new(sink.clone()), sink)
}

/// Records with the given message.
#[allow(dead_code)]
pub fn records_with(sink: &MemorySink, message: &str) -> Vec<(Level, LogRecord)> {
    sink.records()
        .into_iter()
        .filter(|(_, r)| r.message.as_str() == message)
        .collect()
}

/// Wait until `message` shows up in the sink.
#[allow(dead_code)]
pub async fn wait_for(sink: &MemorySink, message: &str) {
    for _ in 0..200 {
        if sink.messages().iter().any(|m| m == message) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("'{}' never logged, got {:?}", message, sink.messages());
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestError(pub String);

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TestError {}

/// Body whose first poll fails.
pub struct FailingBody;

impl Body for FailingBody {
    type Data = Bytes;
    type Error = TestError;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(Some(Err(TestError("stream reset".to_string()))))
    }
}

/// Body that never yields.
pub struct PendingBody;

impl Body for PendingBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Pending
    }
}

pub fn full(body: &'static str) -> Full<Bytes> {
    Full::new(Bytes::from_static(body.as_bytes()))
}

/// In-process server wired like the demo binary.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn spawn(logger: Logger) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");

        let service = ServiceBuilder::new()
            .layer(logger.layer())
            .layer(ErrorPageLayer::new(render_error))
            .layer(logger.error_layer())
            .service_fn(handle);

        tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    continue;
                };
                let service = ServiceBuilder::new()
                    .map_request(move |mut req: Request<Incoming>| {
                        req.extensions_mut().insert(ConnectionInfo::tcp(peer));
                        req
                    })
                    .service(service.clone());

                tokio::spawn(async move {
                    let _ = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
                        .await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn handle(
    req: Request<ObservedBody<ObservedBody<Incoming>>>,
) -> Result<Response<Full<Bytes>>, TestError> {
    if let Some(user) = req.headers().get("x-user-id").and_then(|v| v.to_str().ok()) {
        if let Some(ctx) = req.correlation() {
            ctx.identify(user);
        }
    }

    match req.uri().path() {
        "/" => Ok(Response::new(full("ok"))),
        "/empty" => {
            let mut response = Response::new(full("dropped by the transport"));
            *response.status_mut() = StatusCode::NO_CONTENT;
            Ok(response)
        }
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Response::new(full("slow")))
        }
        "/echo" => {
            let body = req
                .into_body()
                .collect()
                .await
                .map_err(|e| TestError(e.to_string()))?
                .to_bytes();
            Ok(Response::new(Full::new(body)))
        }
        "/fail" => Err(TestError("simulated failure".to_string())),
        _ => {
            let mut response = Response::new(full("not found"));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

/// Error page used by the test server and the layer tests.
pub fn render_error(_err: TestError) -> Response<Full<Bytes>> {
    let mut response = Response::new(full("internal server error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
