//! Runtime configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use portal_observability::ErrorLogPolicy;

/// How the HTTP boundary logs and renders errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHandlingConfig {
    /// Replace high/critical errors in response bodies with a generic shape.
    pub hide_internal_errors: bool,
    /// Log low-severity errors too.
    pub log_all_errors: bool,
    /// Capture stack traces for high/critical errors and recovered panics.
    pub enable_stack_traces: bool,
    /// Paths under this prefix always get JSON error pages.
    pub api_prefix: String,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl ErrorHandlingConfig {
    pub fn development() -> Self {
        Self {
            hide_internal_errors: false,
            log_all_errors: true,
            enable_stack_traces: true,
            api_prefix: "/api".to_string(),
        }
    }

    pub fn production() -> Self {
        Self {
            hide_internal_errors: true,
            log_all_errors: false,
            enable_stack_traces: false,
            api_prefix: "/api".to_string(),
        }
    }

    pub fn log_policy(&self) -> ErrorLogPolicy {
        ErrorLogPolicy {
            log_all_errors: self.log_all_errors,
            enable_stack_traces: self.enable_stack_traces,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub error_handling: ErrorHandlingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a boolean, got '{value}'")]
    InvalidBool { var: &'static str, value: String },

    #[error("PORTAL_BIND_ADDR is not a socket address: '{value}'")]
    InvalidAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

impl AppConfig {
    /// Read `PORTAL_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source.
    ///
    /// `PORTAL_ENV=production` selects the production defaults; the
    /// individual flags override them either way.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("PORTAL_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::InvalidAddr { value: bind.clone(), source })?;

        let production = lookup("PORTAL_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));
        let mut error_handling = if production {
            ErrorHandlingConfig::production()
        } else {
            ErrorHandlingConfig::development()
        };

        if let Some(v) = flag(&lookup, "PORTAL_HIDE_INTERNAL_ERRORS")? {
            error_handling.hide_internal_errors = v;
        }
        if let Some(v) = flag(&lookup, "PORTAL_LOG_ALL_ERRORS")? {
            error_handling.log_all_errors = v;
        }
        if let Some(v) = flag(&lookup, "PORTAL_STACK_TRACES")? {
            error_handling.enable_stack_traces = v;
        }
        if let Some(prefix) = lookup("PORTAL_API_PREFIX") {
            error_handling.api_prefix = prefix;
        }

        Ok(Self {
            bind_addr,
            error_handling,
        })
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<bool>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_development() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.error_handling, ErrorHandlingConfig::development());
    }

    #[test]
    fn production_env_hides_internal_errors() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("PORTAL_ENV", "production")])).unwrap();
        assert!(cfg.error_handling.hide_internal_errors);
        assert!(!cfg.error_handling.enable_stack_traces);
    }

    #[test]
    fn explicit_flags_override_environment_defaults() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("PORTAL_ENV", "production"),
            ("PORTAL_HIDE_INTERNAL_ERRORS", "false"),
            ("PORTAL_LOG_ALL_ERRORS", "yes"),
            ("PORTAL_BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert!(!cfg.error_handling.hide_internal_errors);
        assert!(cfg.error_handling.log_all_errors);
        assert_eq!(cfg.bind_addr.port(), 9000);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORTAL_STACK_TRACES", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { var: "PORTAL_STACK_TRACES", .. }));

        let err = AppConfig::from_lookup(lookup_from(&[("PORTAL_BIND_ADDR", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr { .. }));
    }
}
