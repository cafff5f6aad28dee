//! `portal-core`: structured application error model.
//!
//! This crate is **pure**: no HTTP, no logging, no I/O. It defines the
//! taxonomy, the error value and its builders; the HTTP boundary and the
//! logging adapter live in other crates.

pub mod builders;
pub mod context;
pub mod error;
pub mod id;
pub mod list;
pub mod sensitive;
pub mod taxonomy;

pub use builders::{PanicPayload, ResultExt, codes, default_user_message};
pub use context::ErrorContext;
pub use error::{AppError, AppResult, Cause, Details};
pub use id::ErrorId;
pub use list::ErrorList;
pub use sensitive::{filter_details, is_sensitive_key};
pub use taxonomy::{ErrorCategory, Severity};
