//! Error taxonomy: categories, severities, and their default classification.
//!
//! Everything here is a pure lookup. Every category has a default for each
//! property, so callers never have to handle a missing entry.

use serde::{Deserialize, Serialize};

/// Fixed classification tag of an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimit,
    Internal,
    External,
    Timeout,
    Unavailable,
}

/// Ordinal importance of an error; drives log level and redaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 10] = [
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::Authorization,
        ErrorCategory::NotFound,
        ErrorCategory::Conflict,
        ErrorCategory::RateLimit,
        ErrorCategory::Internal,
        ErrorCategory::External,
        ErrorCategory::Timeout,
        ErrorCategory::Unavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unavailable => "unavailable",
        }
    }

    /// Parse a category name; unknown names get `internal` semantics.
    pub fn parse_lossy(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .unwrap_or(ErrorCategory::Internal)
    }

    /// Map an HTTP status to the category used for framework-native errors.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorCategory::Validation,
            401 => ErrorCategory::Authentication,
            403 => ErrorCategory::Authorization,
            404 => ErrorCategory::NotFound,
            409 => ErrorCategory::Conflict,
            429 => ErrorCategory::RateLimit,
            408 => ErrorCategory::Timeout,
            503 => ErrorCategory::Unavailable,
            _ => ErrorCategory::Internal,
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorCategory::Validation | ErrorCategory::NotFound => Severity::Low,
            ErrorCategory::Authentication
            | ErrorCategory::Authorization
            | ErrorCategory::Conflict
            | ErrorCategory::RateLimit
            | ErrorCategory::Timeout => Severity::Medium,
            ErrorCategory::Internal | ErrorCategory::External | ErrorCategory::Unavailable => {
                Severity::High
            }
        }
    }

    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::Authentication => 401,
            ErrorCategory::Authorization => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::RateLimit => 429,
            ErrorCategory::Timeout => 408,
            ErrorCategory::External => 502,
            ErrorCategory::Unavailable => 503,
            ErrorCategory::Internal => 500,
        }
    }

    pub fn default_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit
                | ErrorCategory::External
                | ErrorCategory::Timeout
                | ErrorCategory::Unavailable
        )
    }
}

impl core::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
