//! Consistent JSON error responses.
//!
//! Single error: `{"error": {...}, "request_id": "..."}`.
//! Several errors: `{"errors": [...], "request_id": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use portal_core::{AppError, Details, ErrorCategory, ErrorList, Severity, codes, default_user_message, filter_details};

use crate::config::ErrorHandlingConfig;
use crate::error::Failure;

const REDACTED_MESSAGE: &str = "An internal error occurred";

/// Marks a response as a finished error body so the middleware leaves it alone.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rendered;

pub(crate) fn mark_rendered(mut res: Response) -> Response {
    res.extensions_mut().insert(Rendered);
    res
}

/// Wire shape of one error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    pub id: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: ErrorCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
struct SingleBody<'a> {
    error: ErrorObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ListBody<'a> {
    errors: Vec<ErrorObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

/// Public view of `err`; severe errors are redacted when configured.
pub fn error_object(err: &AppError, config: &ErrorHandlingConfig) -> ErrorObject {
    if config.hide_internal_errors && err.severity >= Severity::High {
        return redacted(err);
    }

    let details = filter_details(&err.details);
    ErrorObject {
        id: err.id.to_string(),
        code: err.code.clone(),
        kind: err.category,
        message: err.message.clone(),
        timestamp: err.timestamp,
        user_message: err.user_message.clone(),
        details: (!details.is_empty()).then_some(details),
        retryable: err.retryable,
    }
}

/// Generic internal-error shape keeping only id, timestamp, user message and retryability.
fn redacted(err: &AppError) -> ErrorObject {
    ErrorObject {
        id: err.id.to_string(),
        code: codes::INTERNAL_ERROR.to_string(),
        kind: ErrorCategory::Internal,
        message: REDACTED_MESSAGE.to_string(),
        timestamp: err.timestamp,
        user_message: Some(
            err.user_message
                .clone()
                .unwrap_or_else(|| default_user_message(ErrorCategory::Internal).to_string()),
        ),
        details: None,
        retryable: err.retryable,
    }
}

pub fn render_error(err: &AppError, config: &ErrorHandlingConfig, request_id: Option<&str>) -> Response {
    let body = SingleBody {
        error: error_object(err, config),
        request_id,
    };
    json_response(err.http_status, &body)
}

/// A list of one collapses to the single-error form.
pub fn render_list(list: &ErrorList, config: &ErrorHandlingConfig, request_id: Option<&str>) -> Response {
    if let Some(only) = list.single() {
        return render_error(only, config, request_id);
    }

    let body = ListBody {
        errors: list.iter().map(|e| error_object(e, config)).collect(),
        request_id,
    };
    json_response(list.http_status(), &body)
}

pub fn render_failure(failure: &Failure, config: &ErrorHandlingConfig, request_id: Option<&str>) -> Response {
    match failure {
        Failure::Single(err) => render_error(err, config, request_id),
        Failure::List(list) => render_list(list, config, request_id),
    }
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    mark_rendered((status, axum::Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn dev() -> ErrorHandlingConfig {
        ErrorHandlingConfig::development()
    }

    #[tokio::test]
    async fn single_error_body_has_expected_fields() {
        let err = AppError::not_found("User", "42");
        let res = render_error(&err, &dev(), Some("req-7"));

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.extensions().get::<Rendered>().is_some());

        let body = body_json(res).await;
        assert_eq!(body["request_id"], "req-7");
        assert_eq!(body["error"]["id"], err.id.to_string());
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
        assert_eq!(body["error"]["type"], "not_found");
        assert_eq!(body["error"]["details"]["id"], "42");
        assert!(body["error"]["timestamp"].as_str().is_some());
        assert!(body["error"].get("retryable").is_none());
    }

    #[tokio::test]
    async fn retryable_only_present_when_true() {
        let err = AppError::unavailable("search");
        let body = body_json(render_error(&err, &dev(), None)).await;
        assert_eq!(body["error"]["retryable"], true);
        assert!(body.get("request_id").is_none());
    }

    #[tokio::test]
    async fn sensitive_details_never_reach_the_body() {
        let err = AppError::validation("bad login")
            .with_detail("password", "hunter2")
            .with_detail("refresh_token", "abc")
            .with_detail("session_cookie", "c")
            .with_detail("field", "email");

        let res = render_error(&err, &dev(), None);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(!text.contains("password"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("refresh_token"));
        assert!(!text.contains("session_cookie"));
        assert!(text.contains("\"field\":\"email\""));
    }

    #[tokio::test]
    async fn details_omitted_when_everything_is_filtered() {
        let err = AppError::validation("x").with_detail("api_key", "k");
        let body = body_json(render_error(&err, &dev(), None)).await;
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn empty_list_is_ok_with_empty_errors() {
        let res = render_list(&ErrorList::new(), &dev(), None);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, serde_json::json!({"errors": []}));
    }

    #[tokio::test]
    async fn list_of_one_collapses() {
        let list = ErrorList::from(AppError::required_field("email"));
        let res = render_list(&list, &dev(), None);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], "REQUIRED_FIELD");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn list_status_is_the_maximum() {
        let list: ErrorList = [
            AppError::required_field("email"),
            AppError::unavailable("mailer"),
            AppError::not_found("User", "1"),
        ]
        .into_iter()
        .collect();

        let res = render_list(&list, &dev(), None);
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(res).await;
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn severe_errors_are_redacted_when_hidden() {
        let err = AppError::internal("connection string postgres://admin@db")
            .with_detail("query", "select * from users")
            .with_severity(Severity::High);

        let res = render_error(&err, &ErrorHandlingConfig::production(), None);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(res).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["type"], "internal");
        assert_eq!(body["error"]["id"], err.id.to_string());
        assert!(body["error"].get("details").is_none());
        assert!(!body.to_string().contains("postgres://"));
        assert!(body["error"]["user_message"].as_str().is_some());
    }

    #[tokio::test]
    async fn client_errors_keep_classification_in_production() {
        let err = AppError::forbidden("invoice", "delete");
        let body = body_json(render_error(&err, &ErrorHandlingConfig::production(), None)).await;
        assert_eq!(body["error"]["code"], "ACCESS_DENIED");
        assert_eq!(body["error"]["type"], "authorization");
    }
}
