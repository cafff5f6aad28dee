//! Structured application error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::context::ErrorContext;
use crate::id::ErrorId;
use crate::taxonomy::{ErrorCategory, Severity};

/// Ordered key/value details attached to an error.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Shared handle to an underlying cause. Never mutated once wrapped.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used by code that reports [`AppError`]s.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error carrying identity, classification and context.
///
/// Created where a failure is detected, decorated while it propagates, and
/// consumed once at the HTTP boundary. Lower layers never log it.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct AppError {
    pub id: ErrorId,
    pub code: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub user_message: Option<String>,
    pub details: Details,
    pub http_status: u16,
    pub retryable: bool,
    #[source]
    pub cause: Option<Cause>,
    pub timestamp: DateTime<Utc>,
    pub context: ErrorContext,
}

impl AppError {
    /// New error with severity, status and retryability taken from `category`.
    pub fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: ErrorId::new(),
            code: code.into(),
            category,
            severity: category.default_severity(),
            message: message.into(),
            user_message: None,
            details: Details::new(),
            http_status: category.default_status(),
            retryable: category.default_retryable(),
            cause: None,
            timestamp: Utc::now(),
            context: ErrorContext::default(),
        }
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Merge `details` into the existing map; incoming keys win.
    pub fn with_details(mut self, details: Details) -> Self {
        self.details.extend(details);
        self
    }

    /// Overlay request/operation context onto what the error already carries.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = std::mem::take(&mut self.context).merge(context);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_shared_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Two errors match when their categories match; codes are ignored.
    pub fn is(&self, other: &AppError) -> bool {
        self.category == other.category
    }

    pub fn is_category(&self, category: ErrorCategory) -> bool {
        self.category == category
    }
}
