//! Tracing setup, the structured logger, and error logging policy.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

/// Structured, field-carrying logger over a pluggable sink.
pub mod logger;

/// Severity-driven logging of [`portal_core::AppError`]s.
pub mod error_logger;

pub use error_logger::{ErrorLogPolicy, ErrorLogger, level_for};
pub use logger::{Fields, LogLevel, LogRecord, LogSink, Logger, MemorySink, TracingSink};
