//! Constructors that stamp consistent codes and messages per scenario.
//!
//! Every builder is pure: same inputs give the same error apart from the
//! generated id and timestamp. None of them perform I/O or log.

use std::any::Any;
use std::error::Error as StdError;
use std::time::Duration;

use crate::error::{AppError, Cause};
use crate::taxonomy::{ErrorCategory, Severity};

pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const REQUIRED_FIELD: &str = "REQUIRED_FIELD";
    pub const INVALID_FORMAT: &str = "INVALID_FORMAT";
    pub const AUTHENTICATION_REQUIRED: &str = "AUTHENTICATION_REQUIRED";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const EXTERNAL_SERVICE_ERROR: &str = "EXTERNAL_SERVICE_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const WRAPPED_ERROR: &str = "WRAPPED_ERROR";
    pub const PANIC_RECOVERED: &str = "PANIC_RECOVERED";
    pub const UNHANDLED_ERROR: &str = "UNHANDLED_ERROR";
    pub const REQUEST_CANCELED: &str = "REQUEST_CANCELED";
    pub const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
}

/// Generic user-facing text per category.
pub fn default_user_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Validation => "The request contains invalid data.",
        ErrorCategory::Authentication => "Please sign in to continue.",
        ErrorCategory::Authorization => "You do not have permission to perform this action.",
        ErrorCategory::NotFound => "The requested resource could not be found.",
        ErrorCategory::Conflict => "The request conflicts with the current state of the resource.",
        ErrorCategory::RateLimit => "Too many requests. Please slow down and try again shortly.",
        ErrorCategory::Internal => "An unexpected error occurred. Please try again later.",
        ErrorCategory::External => "A service we depend on is having problems. Please try again later.",
        ErrorCategory::Timeout => "The request took too long to complete. Please try again.",
        ErrorCategory::Unavailable => "The service is temporarily unavailable. Please try again later.",
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, codes::VALIDATION_ERROR, message)
            .with_user_message(default_user_message(ErrorCategory::Validation))
    }

    pub fn required_field(field: &str) -> Self {
        Self::new(
            ErrorCategory::Validation,
            codes::REQUIRED_FIELD,
            format!("Field '{field}' is required"),
        )
        .with_detail("field", field)
        .with_user_message(format!("Please provide a value for {field}."))
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCategory::Validation,
            codes::INVALID_FORMAT,
            format!("Field '{field}' has invalid format, expected {expected}"),
        )
        .with_detail("field", field)
        .with_detail("expected_format", expected)
        .with_user_message(format!("The value for {field} is not in the expected format."))
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Authentication, codes::AUTHENTICATION_REQUIRED, message)
            .with_user_message(default_user_message(ErrorCategory::Authentication))
    }

    pub fn invalid_credentials() -> Self {
        Self::new(
            ErrorCategory::Authentication,
            codes::INVALID_CREDENTIALS,
            "Invalid username or password",
        )
        .with_user_message("The email or password you entered is incorrect.")
    }

    pub fn token_expired() -> Self {
        Self::new(ErrorCategory::Authentication, codes::TOKEN_EXPIRED, "Authentication token has expired")
            .with_user_message("Your session has expired. Please sign in again.")
    }

    pub fn forbidden(resource: &str, action: &str) -> Self {
        Self::new(
            ErrorCategory::Authorization,
            codes::ACCESS_DENIED,
            format!("Access denied: cannot {action} {resource}"),
        )
        .with_detail("resource", resource)
        .with_detail("action", action)
        .with_user_message(default_user_message(ErrorCategory::Authorization))
    }

    /// `"<resource> with ID '<id>' not found"`, or `"<resource> not found"` for an empty id.
    pub fn not_found(resource: &str, id: &str) -> Self {
        let message = if id.is_empty() {
            format!("{resource} not found")
        } else {
            format!("{resource} with ID '{id}' not found")
        };

        let err = Self::new(ErrorCategory::NotFound, codes::RESOURCE_NOT_FOUND, message)
            .with_detail("resource", resource)
            .with_user_message(default_user_message(ErrorCategory::NotFound));

        if id.is_empty() { err } else { err.with_detail("id", id) }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, codes::CONFLICT, message)
            .with_user_message(default_user_message(ErrorCategory::Conflict))
    }

    pub fn already_exists(resource: &str, field: &str, value: &str) -> Self {
        Self::new(
            ErrorCategory::Conflict,
            codes::RESOURCE_ALREADY_EXISTS,
            format!("{resource} with {field} '{value}' already exists"),
        )
        .with_detail("resource", resource)
        .with_detail("field", field)
        .with_detail("value", value)
        .with_user_message(format!("A {} with this {field} already exists.", resource.to_lowercase()))
    }

    pub fn rate_limited(limit: u32, window: Duration) -> Self {
        Self::new(
            ErrorCategory::RateLimit,
            codes::RATE_LIMIT_EXCEEDED,
            format!("Rate limit of {limit} requests per {}s exceeded", window.as_secs()),
        )
        .with_detail("limit", limit)
        .with_detail("window_seconds", window.as_secs())
        .with_user_message(default_user_message(ErrorCategory::RateLimit))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, codes::INTERNAL_ERROR, message)
            .with_user_message(default_user_message(ErrorCategory::Internal))
    }

    pub fn database<E>(operation: &str, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(
            ErrorCategory::Internal,
            codes::DATABASE_ERROR,
            format!("Database operation '{operation}' failed"),
        )
        .with_detail("operation", operation)
        .with_user_message(default_user_message(ErrorCategory::Internal))
        .with_cause(cause)
    }

    pub fn external_service<E>(service: &str, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(
            ErrorCategory::External,
            codes::EXTERNAL_SERVICE_ERROR,
            format!("External service '{service}' failed"),
        )
        .with_detail("service", service)
        .with_user_message(default_user_message(ErrorCategory::External))
        .with_cause(cause)
    }

    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(
            ErrorCategory::Timeout,
            codes::TIMEOUT,
            format!("Operation '{operation}' timed out after {}ms", after.as_millis()),
        )
        .with_detail("operation", operation)
        .with_detail("timeout_ms", u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
        .with_user_message(default_user_message(ErrorCategory::Timeout))
    }

    pub fn unavailable(service: &str) -> Self {
        Self::new(
            ErrorCategory::Unavailable,
            codes::SERVICE_UNAVAILABLE,
            format!("Service '{service}' is unavailable"),
        )
        .with_detail("service", service)
        .with_user_message(default_user_message(ErrorCategory::Unavailable))
    }

    /// Classify a bare HTTP status, keeping the status itself.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let category = ErrorCategory::from_status(status);
        Self::new(category, format!("HTTP_{status}"), message)
            .with_status(status)
            .with_user_message(default_user_message(category))
    }

    /// Convert a recovered panic payload. Always internal and critical.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let value = panic_message(payload.as_ref());
        Self::new(
            ErrorCategory::Internal,
            codes::PANIC_RECOVERED,
            format!("panic recovered: {value}"),
        )
        .with_severity(Severity::Critical)
        .with_detail("panic", value.clone())
        .with_user_message(default_user_message(ErrorCategory::Internal))
        .with_cause(PanicPayload(value))
    }

    /// Wrap a foreign error under `category`.
    ///
    /// An error that already is an [`AppError`] comes back unchanged: it keeps
    /// its classification, code and identity.
    pub fn wrap<E>(err: E, category: ErrorCategory, message: impl Into<String>) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = err.into();
        match boxed.downcast::<AppError>() {
            Ok(app) => *app,
            Err(other) => Self::new(category, codes::WRAPPED_ERROR, message)
                .with_user_message(default_user_message(category))
                .with_shared_cause(Cause::from(other)),
        }
    }

    /// [`AppError::wrap`] over an optional error; `None` stays `None`.
    pub fn wrap_option<E>(err: Option<E>, category: ErrorCategory, message: impl Into<String>) -> Option<Self>
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        err.map(|e| Self::wrap(e, category, message))
    }
}

/// `Result` adapter that classifies the error side.
pub trait ResultExt<T> {
    fn wrap_err(self, category: ErrorCategory, message: impl Into<String>) -> Result<T, AppError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Box<dyn StdError + Send + Sync + 'static>>,
{
    fn wrap_err(self, category: ErrorCategory, message: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::wrap(e, category, message))
    }
}

/// Original panic value held as the cause of a recovered panic.
#[derive(Debug, Clone, thiserror::Error)]
#[error("panic: {0}")]
pub struct PanicPayload(pub String);

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
