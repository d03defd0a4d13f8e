//! Request and response facts as they stand at the moment of the call.
//!
//! Every function here is a pure read. Missing data falls back through an
//! ordered list of sources and ends in `None` (or an empty string for the
//! referrer); nothing panics.

use http::uri::Scheme;
use http::Version;

use crate::core::{ConnectionInfo, CorrelationContext, RequestFacts, ResponseState};

/// Path and query the client asked for.
///
/// When a rewriting layer stored the [`OriginalUri`](crate::core::OriginalUri),
/// that one wins over the current URI.
pub fn url(req: &RequestFacts) -> String {
    let uri = req.original_uri().unwrap_or(req.uri());
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Host name without port: the `Host` header first, then the URI authority.
pub fn hostname(req: &RequestFacts) -> Option<String> {
    if let Some(host) = req.host() {
        return Some(strip_port(host).to_string());
    }
    req.uri().host().map(str::to_string)
}

/// `https` when the URI scheme or the connection says TLS, `http` otherwise.
pub fn protocol(req: &RequestFacts) -> &'static str {
    let secure_uri = req.uri().scheme() == Some(&Scheme::HTTPS);
    let secure_conn = req.connection().is_some_and(|c| c.secure);
    if secure_uri || secure_conn {
        "https"
    } else {
        "http"
    }
}

/// Protocol version as `major.minor`.
pub fn http_version(req: &RequestFacts) -> &'static str {
    match req.version() {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Client address.
///
/// Precedence: `X-Forwarded-For` header as sent, the address reported by
/// the connection layer, the socket peer, then the peer of any tunneled
/// connection underneath.
pub fn remote_address(req: &RequestFacts) -> Option<String> {
    if let Some(forwarded) = req.forwarded_for() {
        return Some(forwarded.to_string());
    }
    if let Some(addr) = req.remote_addr() {
        return Some(addr.to_string());
    }
    req.connection().and_then(socket_address)
}

fn socket_address(conn: &ConnectionInfo) -> Option<String> {
    match conn.peer_addr {
        Some(peer) => Some(peer.ip().to_string()),
        None => conn.tunnel.as_deref().and_then(socket_address),
    }
}

pub fn user_agent(req: &RequestFacts) -> Option<&str> {
    req.user_agent()
}

/// `Referer`, then `Referrer`, else empty.
pub fn referrer(req: &RequestFacts) -> &str {
    req.referer().or(req.referrer()).unwrap_or("")
}

/// Milliseconds since arrival, fresh on every call.
pub fn elapsed(ctx: &CorrelationContext) -> f64 {
    ctx.elapsed_ms()
}

/// Whether the response has been fully handed to the transport.
pub fn is_complete(res: &ResponseState) -> bool {
    res.is_complete()
}

/// Status code, once the response is complete.
pub fn status_code(res: &ResponseState) -> Option<u16> {
    if !res.is_complete() {
        return None;
    }
    res.head().map(|head| head.status.as_u16())
}

/// Body length, once the response is complete.
///
/// The finalized `Content-Length` header is checked first; chunked and
/// streamed bodies carry none, so the byte meter is the second source.
pub fn content_length(res: &ResponseState) -> Option<u64> {
    if !res.is_complete() {
        return None;
    }
    res.head()
        .and_then(|head| head.content_length)
        .or(Some(res.sent_bytes()))
}

/// Milliseconds from arrival to response completion.
pub fn response_time(res: &ResponseState) -> Option<f64> {
    res.completed_at_ms()
}

fn strip_port(host: &str) -> &str {
    // [v6]:port
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
