//! Structured logger with non-mutating field composition.
//!
//! A [`Logger`] is a cheap value: `with_*` calls return a new logger carrying
//! the extra fields and leave the original untouched. Records are handed to a
//! shared [`LogSink`], which owns any synchronization.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use portal_core::ErrorContext;

/// Structured fields attached to a record.
pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One emitted log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Thread-safe output for log records.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Forwards records to the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) {
        let fields = Value::Object(record.fields.clone());
        let error = record.error.as_deref();
        let message = record.message.as_str();

        match record.level {
            LogLevel::Debug => ::tracing::debug!(fields = %fields, error, "{message}"),
            LogLevel::Info => ::tracing::info!(fields = %fields, error, "{message}"),
            LogLevel::Warn => ::tracing::warn!(fields = %fields, error, "{message}"),
            LogLevel::Error => ::tracing::error!(fields = %fields, error, "{message}"),
        }
    }
}

/// Keeps records in memory; used by tests to assert on what was logged.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        self.lock().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) {
        self.lock().push(record.clone());
    }
}

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    fields: Fields,
    error: Option<String>,
}

impl core::fmt::Debug for Logger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Logger")
            .field("fields", &self.fields)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            fields: Fields::new(),
            error: None,
        }
    }

    /// Logger backed by [`TracingSink`].
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.fields.insert(key.into(), value.into());
        next
    }

    pub fn with_fields<K, V>(&self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut next = self.clone();
        next.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        next
    }

    /// Attach an error; its full source chain is rendered.
    pub fn with_error(&self, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut next = self.clone();
        next.error = Some(error_chain(err));
        next
    }

    /// Add the conventional request identifiers found in `ctx`.
    pub fn with_request_context(&self, ctx: &ErrorContext) -> Self {
        let ids = [
            ("request_id", &ctx.request_id),
            ("user_id", &ctx.user_id),
            ("session_id", &ctx.session_id),
            ("trace_id", &ctx.trace_id),
        ];

        self.with_fields(
            ids.into_iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k, v.clone()))),
        )
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.write(&LogRecord {
            level,
            message: message.into(),
            fields: self.fields.clone(),
            error: self.error.clone(),
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

/// `outer: inner: root` rendering of an error and its sources.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}
