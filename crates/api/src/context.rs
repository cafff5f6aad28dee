//! Request-scoped context: what the error boundary knows about a request.
//!
//! The request extensions are the request-scoped store. Authentication
//! layers put [`CurrentUser`] / [`SessionId`] there; the error middleware
//! snapshots them together with transport-level details.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, header};
use tower_http::request_id::RequestId;
use uuid::Uuid;

use portal_core::ErrorContext;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated user of the current request.
///
/// Inserted into the request extensions by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    id: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Session identifier of the current request, set by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

/// Context captured at the error boundary, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext(pub ErrorContext);

impl RequestContext {
    pub fn request_id(&self) -> Option<&str> {
        self.0.request_id.as_deref()
    }
}

/// Snapshot request id, client ip, user agent and user/session identifiers.
///
/// The request id comes from the `RequestId` extension set by
/// `SetRequestIdLayer`, then the raw header; one is generated when neither
/// is present.
pub fn capture<B>(req: &Request<B>) -> ErrorContext {
    let headers = req.headers();
    let extensions = req.extensions();

    let request_id = extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| header_str(headers, REQUEST_ID_HEADER))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let mut ctx = ErrorContext::new()
        .with_request_id(request_id)
        .with_metadata("method", req.method().as_str())
        .with_metadata("path", req.uri().path());

    let connect = extensions.get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    if let Some(ip) = client_ip(headers, connect) {
        ctx = ctx.with_ip(ip);
    }
    if let Some(ua) = header_str(headers, header::USER_AGENT.as_str()) {
        ctx = ctx.with_user_agent(ua);
    }
    if let Some(trace_id) = trace_id(headers) {
        ctx = ctx.with_trace_id(trace_id);
    }
    if let Some(user) = extensions.get::<CurrentUser>() {
        ctx = ctx.with_user_id(user.id());
    }
    if let Some(session) = extensions.get::<SessionId>() {
        ctx = ctx.with_session_id(session.0.clone());
    }

    ctx
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    if let Some(real) = header_str(headers, "x-real-ip") {
        return Some(real.trim().to_string());
    }
    peer.map(|p| p.ip().to_string())
}

/// Trace id from a W3C `traceparent` header (`00-<trace-id>-<span-id>-<flags>`).
fn trace_id(headers: &HeaderMap) -> Option<String> {
    let parent = header_str(headers, "traceparent")?;
    let id = parent.split('-').nth(1)?;
    (id.len() == 32).then(|| id.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}
