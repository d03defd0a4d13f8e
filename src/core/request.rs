//! Request facts captured when a request is first instrumented.
//!
//! The request itself moves down the service stack, so everything the log
//! records need is copied out of it once, at arrival. Hosts describe the
//! connection through optional extensions:
//!
//! - [`OriginalUri`] - set by a rewriting layer before it changes the URI
//! - [`RemoteAddr`] - client address as reported by the connection layer
//!   (PROXY protocol, a trusted load balancer, ...)
//! - [`ConnectionInfo`] - socket level information, possibly nested when the
//!   request arrived through a tunnel
//! - [`AuthenticatedUser`] - identity established before instrumentation

use std::net::{IpAddr, SocketAddr};

use http::header::{self, HeaderName};
use http::{HeaderMap, Method, Request, Uri, Version};

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static REFERRER: HeaderName = HeaderName::from_static("referrer");

/// The URI as the client sent it, before any internal rewrite.
#[derive(Clone, Debug)]
pub struct OriginalUri(pub Uri);

/// Client address reported by the connection layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteAddr(pub IpAddr);

/// Authenticated principal attached by an auth layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Transport level information about the connection a request arrived on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Peer address of this socket.
    pub peer_addr: Option<SocketAddr>,
    /// Whether the connection is TLS.
    pub secure: bool,
    /// Underlying connection when this one is tunneled or proxied.
    pub tunnel: Option<Box<ConnectionInfo>>,
}

impl ConnectionInfo {
    /// Plain TCP connection from `peer_addr`.
    pub fn tcp(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr: Some(peer_addr),
            secure: false,
            tunnel: None,
        }
    }

    /// Mark the connection as TLS.
    pub fn with_tls(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Attach the underlying connection.
    pub fn with_tunnel(mut self, tunnel: ConnectionInfo) -> Self {
        self.tunnel = Some(Box::new(tunnel));
        self
    }
}

/// Snapshot of the request taken at first instrumentation.
#[derive(Clone, Debug)]
pub struct RequestFacts {
    method: Method,
    uri: Uri,
    original_uri: Option<Uri>,
    version: Version,
    host: Option<String>,
    forwarded_for: Option<String>,
    user_agent: Option<String>,
    referer: Option<String>,
    referrer: Option<String>,
    remote_addr: Option<IpAddr>,
    connection: Option<ConnectionInfo>,
    user_id: Option<String>,
}

impl RequestFacts {
    /// Copy the logged facts out of a request.
    pub fn capture<B>(req: &Request<B>) -> Self {
        let headers = req.headers();
        let extensions = req.extensions();

        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            original_uri: extensions.get::<OriginalUri>().map(|o| o.0.clone()),
            version: req.version(),
            host: header_string(headers, &header::HOST),
            forwarded_for: header_string(headers, &X_FORWARDED_FOR),
            user_agent: header_string(headers, &header::USER_AGENT),
            referer: header_string(headers, &header::REFERER),
            referrer: header_string(headers, &REFERRER),
            remote_addr: extensions.get::<RemoteAddr>().map(|r| r.0),
            connection: extensions.get::<ConnectionInfo>().cloned(),
            user_id: extensions.get::<AuthenticatedUser>().map(|u| u.id.clone()),
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[inline]
    pub fn original_uri(&self) -> Option<&Uri> {
        self.original_uri.as_ref()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[inline]
    pub fn forwarded_for(&self) -> Option<&str> {
        self.forwarded_for.as_deref()
    }

    #[inline]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// `Referer` header (the standard misspelling).
    #[inline]
    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// Non-standard `Referrer` header.
    #[inline]
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    #[inline]
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    #[inline]
    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    /// User id known at arrival, if an auth layer ran first.
    #[inline]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

/// Header value as an owned string, skipping non-UTF-8 and empty values.
#[inline]
fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
