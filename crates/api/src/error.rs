//! Errors handlers can return, and how the boundary normalizes them.
//!
//! Handlers return `Result<T, HandlerError>`. The `IntoResponse` impl parks
//! the error in the response extensions; the error middleware picks it up,
//! normalizes it into an [`AppError`] (or [`ErrorList`]) with request
//! context, logs it once and renders the final body.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use portal_core::{AppError, Cause, ErrorCategory, ErrorContext, ErrorList, codes, default_user_message};

use crate::app::errors::render_failure;
use crate::config::ErrorHandlingConfig;

/// Framework-level HTTP error: a status plus an optional underlying cause.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    #[source]
    pub cause: Option<Cause>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }
}

macro_rules! http_error_from_rejection {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for HttpError {
                fn from(rejection: $t) -> Self {
                    HttpError::new(rejection.status(), rejection.body_text()).with_cause(rejection)
                }
            }

            impl From<$t> for HandlerError {
                fn from(rejection: $t) -> Self {
                    HandlerError::Http(rejection.into())
                }
            }
        )*
    };
}

http_error_from_rejection!(JsonRejection, PathRejection, QueryRejection);

/// Everything a handler may fail with.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error(transparent)]
    App(AppError),

    #[error(transparent)]
    List(ErrorList),

    #[error(transparent)]
    Http(HttpError),

    /// The work this request waited on was canceled upstream.
    #[error("request canceled")]
    Canceled,

    /// A deadline elapsed before the work finished.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Unhandled(Cause),
}

impl From<AppError> for HandlerError {
    fn from(value: AppError) -> Self {
        HandlerError::App(value)
    }
}

impl From<ErrorList> for HandlerError {
    fn from(value: ErrorList) -> Self {
        HandlerError::List(value)
    }
}

impl From<HttpError> for HandlerError {
    fn from(value: HttpError) -> Self {
        HandlerError::Http(value)
    }
}

impl From<tokio::time::error::Elapsed> for HandlerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        HandlerError::DeadlineExceeded
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for HandlerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        HandlerError::Canceled
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<AppError>() {
            Ok(app) => return HandlerError::App(app),
            Err(err) => err,
        };
        let err = match err.downcast::<ErrorList>() {
            Ok(list) => return HandlerError::List(list),
            Err(err) => err,
        };
        let err = match err.downcast::<HttpError>() {
            Ok(http) => return HandlerError::Http(http),
            Err(err) => err,
        };
        let err = match err.downcast::<tokio::time::error::Elapsed>() {
            Ok(_) => return HandlerError::DeadlineExceeded,
            Err(err) => err,
        };

        let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
        HandlerError::Unhandled(Cause::from(boxed))
    }
}

/// A normalized failure, ready to be logged and rendered.
#[derive(Debug, Clone)]
pub enum Failure {
    Single(AppError),
    List(ErrorList),
}

impl Failure {
    pub fn http_status(&self) -> u16 {
        match self {
            Failure::Single(e) => e.http_status,
            Failure::List(l) => l.http_status(),
        }
    }

    pub fn errors(&self) -> Box<dyn Iterator<Item = &AppError> + '_> {
        match self {
            Failure::Single(e) => Box::new(std::iter::once(e)),
            Failure::List(l) => Box::new(l.iter()),
        }
    }
}

/// Turn any handler error into an [`AppError`]-based failure carrying `ctx`.
pub fn normalize(err: HandlerError, ctx: &ErrorContext) -> Failure {
    let single = match err {
        HandlerError::App(app) => app,
        HandlerError::List(mut list) => {
            for e in list.iter_mut() {
                *e = e.clone().with_context(ctx.clone());
            }
            return Failure::List(list);
        }
        HandlerError::Http(http) => {
            let app = AppError::from_status(http.status.as_u16(), http.message);
            match http.cause {
                Some(cause) => app.with_shared_cause(cause),
                None => app,
            }
        }
        HandlerError::Canceled => {
            AppError::new(ErrorCategory::Timeout, codes::REQUEST_CANCELED, "request was canceled")
                .with_user_message(default_user_message(ErrorCategory::Timeout))
        }
        HandlerError::DeadlineExceeded => {
            AppError::new(ErrorCategory::Timeout, codes::REQUEST_TIMEOUT, "request deadline exceeded")
                .with_user_message(default_user_message(ErrorCategory::Timeout))
        }
        HandlerError::Unhandled(cause) => AppError::new(
            ErrorCategory::Internal,
            codes::UNHANDLED_ERROR,
            format!("unhandled error: {cause}"),
        )
        .with_user_message(default_user_message(ErrorCategory::Internal))
        .with_shared_cause(cause),
    };

    Failure::Single(single.with_context(ctx.clone()))
}

/// Marker extension carrying a handler error to the error middleware.
#[derive(Debug, Clone)]
pub(crate) struct PendingError(pub(crate) HandlerError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        // Without the middleware this is what the client sees, so render the
        // redacted shape; the middleware replaces it.
        let failure = normalize(self.clone(), &ErrorContext::default());
        let mut res = render_failure(&failure, &ErrorHandlingConfig::production(), None);
        res.extensions_mut().insert(PendingError(self));
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::Severity;

    fn ctx() -> ErrorContext {
        ErrorContext::new().with_request_id("req-1").with_ip("127.0.0.1")
    }

    fn single(f: Failure) -> AppError {
        match f {
            Failure::Single(e) => e,
            Failure::List(_) => panic!("expected a single error"),
        }
    }

    #[test]
    fn app_errors_pass_through_with_context() {
        let original = AppError::not_found("User", "42");
        let id = original.id;

        let err = single(normalize(original.into(), &ctx()));
        assert_eq!(err.id, id);
        assert_eq!(err.code, codes::RESOURCE_NOT_FOUND);
        assert_eq!(err.context.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn http_errors_map_status_to_category_and_keep_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "inner");
        let http = HttpError::new(StatusCode::TOO_MANY_REQUESTS, "slow down").with_cause(io);

        let err = single(normalize(http.into(), &ctx()));
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert_eq!(err.http_status, 429);
        assert_eq!(err.cause.unwrap().to_string(), "inner");

        let err = single(normalize(HttpError::new(StatusCode::IM_A_TEAPOT, "tea").into(), &ctx()));
        assert_eq!(err.category, ErrorCategory::Internal);
        assert_eq!(err.http_status, 418);
    }

    #[test]
    fn cancellation_and_deadline_get_distinct_codes() {
        let canceled = single(normalize(HandlerError::Canceled, &ctx()));
        let deadline = single(normalize(HandlerError::DeadlineExceeded, &ctx()));

        assert_eq!(canceled.category, ErrorCategory::Timeout);
        assert_eq!(deadline.category, ErrorCategory::Timeout);
        assert_eq!(canceled.code, codes::REQUEST_CANCELED);
        assert_eq!(deadline.code, codes::REQUEST_TIMEOUT);
    }

    #[test]
    fn unknown_errors_become_unhandled_internal_errors() {
        let err: HandlerError = anyhow::anyhow!("something odd").into();
        let err = single(normalize(err, &ctx()));
        assert_eq!(err.code, codes::UNHANDLED_ERROR);
        assert_eq!(err.category, ErrorCategory::Internal);
        assert_eq!(err.severity, Severity::High);
        assert_eq!(err.cause.unwrap().to_string(), "something odd");
    }

    #[test]
    fn anyhow_wrapping_an_app_error_is_recognized() {
        let err: HandlerError = anyhow::Error::new(AppError::conflict("stale")).into();
        assert!(matches!(err, HandlerError::App(ref e) if e.code == codes::CONFLICT));
    }

    #[tokio::test]
    async fn elapsed_timeouts_become_deadline_exceeded() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            tokio::time::sleep(std::time::Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

        assert!(matches!(HandlerError::from(elapsed), HandlerError::DeadlineExceeded));
    }

    #[test]
    fn lists_get_context_on_every_element() {
        let list: ErrorList = [AppError::required_field("a"), AppError::required_field("b")]
            .into_iter()
            .collect();

        match normalize(list.into(), &ctx()) {
            Failure::List(l) => {
                assert!(l.iter().all(|e| e.context.request_id.as_deref() == Some("req-1")));
            }
            Failure::Single(_) => panic!("expected a list"),
        }
    }

    #[test]
    fn into_response_parks_the_error_for_the_middleware() {
        let res = HandlerError::from(AppError::not_found("User", "1")).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.extensions().get::<PendingError>().is_some());
    }
}
