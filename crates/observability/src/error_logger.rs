//! Logging of application errors according to their severity.
//!
//! This is the only place (besides the HTTP boundary that calls it) where an
//! [`AppError`] turns into a log entry.

use std::backtrace::Backtrace;

use serde_json::Value;

use portal_core::{AppError, ErrorList, Severity, filter_details};

use crate::logger::{Fields, LogLevel, Logger, error_chain};

/// Severity → (level by default, level when `log_all_errors` is on).
const SEVERITY_LEVELS: [(Severity, Option<LogLevel>, Option<LogLevel>); 4] = [
    (Severity::Critical, Some(LogLevel::Error), Some(LogLevel::Error)),
    (Severity::High, Some(LogLevel::Error), Some(LogLevel::Error)),
    (Severity::Medium, Some(LogLevel::Warn), Some(LogLevel::Warn)),
    (Severity::Low, None, Some(LogLevel::Info)),
];

/// Level an error of `severity` is logged at, or `None` when it is suppressed.
pub fn level_for(severity: Severity, log_all_errors: bool) -> Option<LogLevel> {
    SEVERITY_LEVELS
        .iter()
        .find(|(s, _, _)| *s == severity)
        .and_then(|(_, default, all)| if log_all_errors { *all } else { *default })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorLogPolicy {
    /// Also log low-severity errors (at info).
    pub log_all_errors: bool,
    /// Capture a stack trace for high/critical errors.
    pub enable_stack_traces: bool,
}

#[derive(Debug, Clone)]
pub struct ErrorLogger {
    logger: Logger,
    policy: ErrorLogPolicy,
}

impl ErrorLogger {
    pub fn new(logger: Logger, policy: ErrorLogPolicy) -> Self {
        Self { logger, policy }
    }

    pub fn policy(&self) -> ErrorLogPolicy {
        self.policy
    }

    /// Emit one entry for `err`; returns the level used, if any.
    pub fn log(&self, err: &AppError) -> Option<LogLevel> {
        let level = level_for(err.severity, self.policy.log_all_errors)?;

        let mut logger = self
            .logger
            .with_request_context(&err.context)
            .with_fields(self.fields_for(err));

        if let Some(cause) = &err.cause {
            logger = logger.with_error(cause.as_ref());
        }

        logger.log(level, err.message.clone());
        Some(level)
    }

    /// Log each element; returns how many entries were emitted.
    pub fn log_list(&self, list: &ErrorList) -> usize {
        list.iter().filter_map(|e| self.log(e)).count()
    }

    fn fields_for(&self, err: &AppError) -> Fields {
        let mut fields = Fields::new();
        fields.insert("error_id".into(), Value::String(err.id.to_string()));
        fields.insert("code".into(), Value::String(err.code.clone()));
        fields.insert("category".into(), Value::String(err.category.as_str().into()));
        fields.insert("severity".into(), Value::String(err.severity.as_str().into()));
        fields.insert("http_status".into(), Value::from(err.http_status));
        fields.insert("retryable".into(), Value::Bool(err.retryable));
        fields.insert("timestamp".into(), Value::String(err.timestamp.to_rfc3339()));

        let mut context = err.context.clone();
        context.metadata = filter_details(&context.metadata);
        if !context.is_empty() {
            if let Ok(v) = serde_json::to_value(&context) {
                fields.insert("context".into(), v);
            }
        }

        let details = filter_details(&err.details);
        if !details.is_empty() {
            fields.insert("details".into(), Value::Object(details));
        }

        if let Some(cause) = &err.cause {
            fields.insert("cause".into(), Value::String(error_chain(cause.as_ref())));
        }

        // A stack captured at the failure site (e.g. a panic) beats one taken here.
        if self.policy.enable_stack_traces
            && err.severity >= Severity::High
            && !err.details.contains_key("stack")
        {
            fields.insert(
                "stack_trace".into(),
                Value::String(Backtrace::force_capture().to_string()),
            );
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemorySink;
    use portal_core::{ErrorCategory, ErrorContext};
    use std::sync::Arc;

    fn logger_with(policy: ErrorLogPolicy) -> (Arc<MemorySink>, ErrorLogger) {
        let sink = Arc::new(MemorySink::new());
        (sink.clone(), ErrorLogger::new(Logger::new(sink), policy))
    }

    #[test]
    fn severity_policy_table() {
        let cases = [
            (Severity::Critical, false, Some(LogLevel::Error)),
            (Severity::High, false, Some(LogLevel::Error)),
            (Severity::Medium, false, Some(LogLevel::Warn)),
            (Severity::Low, false, None),
            (Severity::Critical, true, Some(LogLevel::Error)),
            (Severity::High, true, Some(LogLevel::Error)),
            (Severity::Medium, true, Some(LogLevel::Warn)),
            (Severity::Low, true, Some(LogLevel::Info)),
        ];

        for (severity, log_all, expected) in cases {
            assert_eq!(level_for(severity, log_all), expected, "{severity} log_all={log_all}");
        }
    }

    #[test]
    fn forced_severity_drives_call_count_and_level() {
        let cases = [
            (Severity::Critical, false, 1, Some(LogLevel::Error)),
            (Severity::High, false, 1, Some(LogLevel::Error)),
            (Severity::Medium, false, 1, Some(LogLevel::Warn)),
            (Severity::Low, false, 0, None),
            (Severity::Low, true, 1, Some(LogLevel::Info)),
        ];

        for (severity, log_all, calls, level) in cases {
            let (sink, logger) = logger_with(ErrorLogPolicy {
                log_all_errors: log_all,
                ..Default::default()
            });
            let err = AppError::validation("bad input").with_severity(severity);

            assert_eq!(logger.log(&err), level);
            assert_eq!(sink.count(), calls, "{severity} log_all={log_all}");
            if let Some(level) = level {
                assert_eq!(sink.records()[0].level, level);
            }
        }
    }

    #[test]
    fn entry_carries_classification_and_filtered_data() {
        let (sink, logger) = logger_with(ErrorLogPolicy::default());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = AppError::database("insert_user", io)
            .with_detail("table", "users")
            .with_detail("password", "hunter2")
            .with_context(
                ErrorContext::new()
                    .with_request_id("req-1")
                    .with_metadata("api_token", "t0k3n")
                    .with_metadata("route", "/users"),
            );

        logger.log(&err);

        let record = &sink.records()[0];
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.fields["code"], "DATABASE_ERROR");
        assert_eq!(record.fields["category"], "internal");
        assert_eq!(record.fields["severity"], "high");
        assert_eq!(record.fields["http_status"], 500);
        assert_eq!(record.fields["retryable"], false);
        assert_eq!(record.fields["request_id"], "req-1");
        assert_eq!(record.fields["details"]["table"], "users");
        assert!(record.fields["details"].get("password").is_none());
        assert_eq!(record.fields["context"]["metadata"]["route"], "/users");
        assert!(record.fields["context"]["metadata"].get("api_token").is_none());
        assert_eq!(record.fields["cause"], "connection reset");
        assert!(!record.fields.contains_key("stack_trace"));
    }

    #[test]
    fn stack_trace_only_for_severe_errors_when_enabled() {
        let (sink, logger) = logger_with(ErrorLogPolicy {
            enable_stack_traces: true,
            ..Default::default()
        });

        logger.log(&AppError::internal("boom"));
        logger.log(&AppError::conflict("stale"));

        let records = sink.records();
        assert!(records[0].fields.contains_key("stack_trace"));
        assert!(!records[1].fields.contains_key("stack_trace"));
    }

    #[test]
    fn existing_stack_detail_is_not_recaptured() {
        let (sink, logger) = logger_with(ErrorLogPolicy {
            enable_stack_traces: true,
            ..Default::default()
        });

        logger.log(&AppError::internal("panic").with_detail("stack", "at handler"));

        let record = &sink.records()[0];
        assert!(!record.fields.contains_key("stack_trace"));
        assert_eq!(record.fields["details"]["stack"], "at handler");
    }

    #[test]
    fn list_logs_each_loggable_element() {
        let (sink, logger) = logger_with(ErrorLogPolicy::default());
        let list: ErrorList = [
            AppError::required_field("email"),
            AppError::new(ErrorCategory::Conflict, "DUP", "dup"),
            AppError::internal("x"),
        ]
        .into_iter()
        .collect();

        assert_eq!(logger.log_list(&list), 2);
        assert_eq!(sink.count(), 2);
    }
}
