//! HTTP application wiring (Axum router + error boundary).
//!
//! - `routes/`: health and error-page handlers
//! - `errors.rs`: consistent error responses

use axum::Router;
use portal_observability::Logger;

use crate::config::ErrorHandlingConfig;
use crate::middleware::ErrorHandling;

pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: ErrorHandlingConfig, logger: Logger) -> Router {
    build_router(ErrorHandling::new(config, logger), Router::new())
}

/// Mount `extra` next to the built-in routes, behind the error boundary.
///
/// The fallback is registered before the layers so unmatched paths go
/// through them too.
pub fn build_router(handling: ErrorHandling, extra: Router<ErrorHandling>) -> Router {
    let router = routes::router()
        .merge(extra)
        .fallback(routes::pages::fallback)
        .with_state(handling.clone());

    handling.apply(router)
}
