//! Error pages for `/error/*` and the router fallback.
//!
//! Browsers get a small HTML page, API clients get the usual JSON error body.

use axum::{
    Extension, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};

use portal_core::{AppError, ErrorCategory, default_user_message};

use crate::app::errors::{mark_rendered, render_error};
use crate::context::RequestContext;
use crate::middleware::ErrorHandling;

const API_TOOLS: &[&str] = &[
    "curl",
    "wget",
    "httpie",
    "postman",
    "insomnia",
    "python-requests",
    "go-http-client",
    "okhttp",
    "axios",
];

const BROWSERS: &[&str] = &["mozilla", "chrome", "safari", "firefox", "edg/", "opera"];

pub fn router() -> Router<ErrorHandling> {
    Router::new()
        .route("/error/404", get(not_found))
        .route("/error/401", get(unauthorized))
        .route("/error/403", get(forbidden))
        .route("/error/500", get(internal))
        .route("/error/:code", get(by_code))
}

/// Decide between an HTML page and a JSON body.
pub fn wants_html(headers: &HeaderMap, path: &str, api_prefix: &str) -> bool {
    if !api_prefix.is_empty() && path.starts_with(api_prefix) {
        return false;
    }

    let accept = lowercase_header(headers, header::ACCEPT);
    if accept.contains("text/html") || accept.contains("application/xhtml") {
        return true;
    }
    if accept.contains("application/json") {
        return false;
    }

    let agent = lowercase_header(headers, header::USER_AGENT);
    if API_TOOLS.iter().any(|tool| agent.contains(tool)) {
        return false;
    }
    BROWSERS.iter().any(|browser| agent.contains(browser))
}

fn lowercase_header(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Everything a page needs from the incoming request.
struct PageRequest<'a> {
    headers: &'a HeaderMap,
    path: &'a str,
    request_id: Option<&'a str>,
}

pub async fn not_found(
    State(state): State<ErrorHandling>,
    uri: Uri,
    headers: HeaderMap,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    page(&state, StatusCode::NOT_FOUND, &request(&uri, &headers, &ctx))
}

pub async fn unauthorized(
    State(state): State<ErrorHandling>,
    uri: Uri,
    headers: HeaderMap,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    page(&state, StatusCode::UNAUTHORIZED, &request(&uri, &headers, &ctx))
}

pub async fn forbidden(
    State(state): State<ErrorHandling>,
    uri: Uri,
    headers: HeaderMap,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    page(&state, StatusCode::FORBIDDEN, &request(&uri, &headers, &ctx))
}

pub async fn internal(
    State(state): State<ErrorHandling>,
    uri: Uri,
    headers: HeaderMap,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    page(&state, StatusCode::INTERNAL_SERVER_ERROR, &request(&uri, &headers, &ctx))
}

/// `/error/{code}`; anything that is not a 4xx/5xx status renders as 500.
pub async fn by_code(
    State(state): State<ErrorHandling>,
    Path(code): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    page(&state, parse_error_status(&code), &request(&uri, &headers, &ctx))
}

/// Router fallback: a negotiated 404 for the path that did not match.
pub async fn fallback(
    State(state): State<ErrorHandling>,
    uri: Uri,
    headers: HeaderMap,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    page(&state, StatusCode::NOT_FOUND, &request(&uri, &headers, &ctx))
}

fn request<'a>(uri: &'a Uri, headers: &'a HeaderMap, ctx: &'a Option<Extension<RequestContext>>) -> PageRequest<'a> {
    PageRequest {
        headers,
        path: uri.path(),
        request_id: ctx.as_ref().and_then(|Extension(c)| c.request_id()),
    }
}

fn parse_error_status(code: &str) -> StatusCode {
    code.parse::<u16>()
        .ok()
        .filter(|c| (400..600).contains(c))
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn page(state: &ErrorHandling, status: StatusCode, req: &PageRequest<'_>) -> Response {
    let category = ErrorCategory::from_status(status.as_u16());
    let title = title_for(status);
    let message = default_user_message(category);

    let res = if wants_html(req.headers, req.path, &state.config().api_prefix) {
        (status, Html(html_page(status, title, message))).into_response()
    } else {
        let err = AppError::from_status(status.as_u16(), title).with_user_message(message);
        render_error(&err, state.config(), req.request_id)
    };
    no_cache(mark_rendered(res))
}

fn title_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "Page Not Found",
        StatusCode::UNAUTHORIZED => "Authentication Required",
        StatusCode::FORBIDDEN => "Access Denied",
        StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
        other => other.canonical_reason().unwrap_or("Error"),
    }
}

fn html_page(status: StatusCode, title: &str, message: &str) -> String {
    let code = status.as_u16();
    let title = escape_html(title);
    let message = escape_html(message);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{code} - {title}</title>
</head>
<body>
<main>
<h1>{code}</h1>
<h2>{title}</h2>
<p>{message}</p>
<p><a href="/">Back to home</a></p>
</main>
</body>
</html>
"#
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn no_cache(mut res: Response) -> Response {
    let headers = res.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorHandlingConfig;
    use axum::body::to_bytes;
    use portal_observability::{Logger, MemorySink};
    use std::sync::Arc;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), value.parse().unwrap());
        }
        map
    }

    fn state() -> ErrorHandling {
        ErrorHandling::new(ErrorHandlingConfig::development(), Logger::new(Arc::new(MemorySink::new())))
    }

    #[test]
    fn api_prefix_always_gets_json() {
        let h = headers(&[(header::ACCEPT, "text/html")]);
        assert!(!wants_html(&h, "/api/users", "/api"));
        assert!(wants_html(&h, "/users", "/api"));
    }

    #[test]
    fn accept_header_wins_over_user_agent() {
        let h = headers(&[(header::ACCEPT, "application/json"), (header::USER_AGENT, "Mozilla/5.0")]);
        assert!(!wants_html(&h, "/x", "/api"));

        let h = headers(&[(header::ACCEPT, "application/xhtml+xml"), (header::USER_AGENT, "curl/8.4")]);
        assert!(wants_html(&h, "/x", "/api"));
    }

    #[test]
    fn user_agent_heuristics() {
        let curl = headers(&[(header::USER_AGENT, "curl/8.4.0")]);
        assert!(!wants_html(&curl, "/x", "/api"));

        let requests = headers(&[(header::USER_AGENT, "python-requests/2.31")]);
        assert!(!wants_html(&requests, "/x", "/api"));

        let firefox = headers(&[(header::USER_AGENT, "Mozilla/5.0 (X11; Linux) Firefox/130.0")]);
        assert!(wants_html(&firefox, "/x", "/api"));

        assert!(!wants_html(&HeaderMap::new(), "/x", "/api"));
    }

    #[test]
    fn edge_token_does_not_match_arbitrary_words() {
        let bot = headers(&[(header::USER_AGENT, "knowledge-bot/1.0")]);
        assert!(!wants_html(&bot, "/x", "/api"));

        let edge = headers(&[(header::USER_AGENT, "Edg/126.0.2592.68")]);
        assert!(wants_html(&edge, "/x", "/api"));
    }

    #[test]
    fn error_codes_outside_4xx_5xx_become_500() {
        assert_eq!(parse_error_status("418"), StatusCode::IM_A_TEAPOT);
        assert_eq!(parse_error_status("503"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(parse_error_status("200"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parse_error_status("abc"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>"x" & 'y'</script>"#),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[tokio::test]
    async fn html_page_has_cache_headers() {
        let h = headers(&[(header::ACCEPT, "text/html")]);
        let req = PageRequest { headers: &h, path: "/error/403", request_id: None };
        let res = page(&state(), StatusCode::FORBIDDEN, &req);

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.headers()[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(res.headers()[header::PRAGMA], "no-cache");
        assert_eq!(res.headers()[header::EXPIRES], "0");
        assert!(res.extensions().get::<crate::app::errors::Rendered>().is_some());
        assert!(res.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Access Denied"));
    }

    #[tokio::test]
    async fn json_page_uses_error_envelope() {
        let h = HeaderMap::new();
        let req = PageRequest { headers: &h, path: "/api/missing", request_id: Some("req-9") };
        let res = page(&state(), StatusCode::NOT_FOUND, &req);

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()[header::EXPIRES], "0");

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["type"], "not_found");
        assert_eq!(body["error"]["code"], "HTTP_404");
        assert_eq!(body["request_id"], "req-9");
    }
}
