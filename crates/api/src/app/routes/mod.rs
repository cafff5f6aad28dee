use axum::{Router, routing::get};

use crate::middleware::ErrorHandling;

pub mod pages;
pub mod system;

/// Routes every deployment serves: health plus the error pages.
pub fn router() -> Router<ErrorHandling> {
    Router::new()
        .route("/health", get(system::health))
        .merge(pages::router())
}
