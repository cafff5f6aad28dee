//! HTTP API: error boundary, error pages and request context.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;

pub use config::{AppConfig, ErrorHandlingConfig};
pub use error::{Failure, HandlerError, HttpError};
pub use middleware::{ErrorHandling, ErrorHook};
