use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tower::{Service, ServiceBuilder};
use tracing::{debug, error, info};

use reqtrail::config::Config;
use reqtrail::core::ConnectionInfo;
use reqtrail::{CorrelationExt, ErrorPageLayer, Logger, ObservedBody};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request body as seen by the handler: observed by both layers.
type HandlerBody = ObservedBody<ObservedBody<Incoming>>;

#[derive(Debug)]
struct HandlerError(String);

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HandlerError {}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    reqtrail::logging::init(&config.logging)?;
    config.log_summary();

    let logger = Logger::from_config(&config.sink)?;
    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .map_err(reqtrail::Error::from)?;

    info!(
        version = reqtrail::PKG_VERSION,
        "Listening on {}",
        listener.local_addr()?
    );

    tokio::select! {
        _ = accept_loop(listener, logger) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}

async fn accept_loop(listener: TcpListener, logger: Logger) {
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .layer(ErrorPageLayer::new(render_error))
        .layer(logger.error_layer())
        .service_fn(handle::<HandlerBody>);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Accept error: {}", e);
                continue;
            }
        };
        let _ = stream.set_nodelay(true);

        let service = service.clone();
        tokio::spawn(serve_connection(stream, peer, service));
    }
}

async fn serve_connection<S, B>(stream: TcpStream, peer: SocketAddr, service: S)
where
    S: Service<Request<Incoming>, Response = Response<B>> + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    // Connection facts for every request on this socket
    let service = ServiceBuilder::new()
        .map_request(move |mut req: Request<Incoming>| {
            req.extensions_mut().insert(ConnectionInfo::tcp(peer));
            req
        })
        .service(service);

    let io = TokioIo::new(stream);
    if let Err(err) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(io, TowerToHyperService::new(service))
        .await
    {
        debug!("Connection error from {}: {:?}", peer, err);
    }
}

async fn handle<B>(req: Request<B>) -> Result<Response<Full<Bytes>>, HandlerError>
where
    B: Body + Send + 'static,
    B::Error: fmt::Display,
{
    if let Some(ctx) = req.correlation() {
        if let Some(user) = req.headers().get("x-user-id").and_then(|v| v.to_str().ok()) {
            ctx.identify(user);
        }
    }

    match req.uri().path() {
        "/" => Ok(text(StatusCode::OK, "ok\n")),
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(text(StatusCode::OK, "slow ok\n"))
        }
        "/echo" => {
            let body = req
                .into_body()
                .collect()
                .await
                .map_err(|e| HandlerError(format!("failed to read body: {}", e)))?
                .to_bytes();
            Ok(Response::new(Full::new(body)))
        }
        "/fail" => Err(HandlerError("simulated failure".to_string())),
        _ => Ok(text(StatusCode::NOT_FOUND, "not found\n")),
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Turn handler errors into 500 responses. The error is already logged.
fn render_error(_err: HandlerError) -> Response<Full<Bytes>> {
    text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error\n")
}
