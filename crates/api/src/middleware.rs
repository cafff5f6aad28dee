//! Error boundary middleware.
//!
//! Two layers share one [`ErrorHandling`] state:
//! - `handle_errors` (outer): captures request context, runs the handler and
//!   translates a parked [`HandlerError`](crate::error::HandlerError) into the
//!   final response.
//!   Plain error responses produced elsewhere (axum rejections, 405 from the
//!   router, other layers) are rebuilt into an [`HttpError`] and take the
//!   same path.
//! - `recover_panics` (inner): catches panics from the handler future and
//!   sends them down the same log/render path.
//!
//! Request ids are set and echoed by `tower-http` layers outside both.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use axum::{
    Router,
    body::to_bytes,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use futures_util::FutureExt;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use portal_core::{AppError, ErrorContext, Severity};
use portal_observability::{ErrorLogger, Logger};

use crate::app::errors::{Rendered, mark_rendered, render_failure};
use crate::config::ErrorHandlingConfig;
use crate::context::{self, RequestContext};
use crate::error::{Failure, HttpError, PendingError, normalize};

/// Largest foreign error body read back as the error message.
const MAX_FOREIGN_BODY: usize = 16 * 1024;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that records the backtrace at the panic site.
///
/// The unwinding panic is caught on the thread that raised it, so
/// `recover_panics` reads the slot from the same thread.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Caller-supplied override of the default error response.
pub trait ErrorHook: Send + Sync {
    /// Return `Some` to take over the response; `None` falls back to the default body.
    fn handle(&self, failure: &Failure, ctx: &ErrorContext) -> Option<Response>;
}

impl<F> ErrorHook for F
where
    F: Fn(&Failure, &ErrorContext) -> Option<Response> + Send + Sync,
{
    fn handle(&self, failure: &Failure, ctx: &ErrorContext) -> Option<Response> {
        self(failure, ctx)
    }
}

#[derive(Clone)]
pub struct ErrorHandling {
    config: Arc<ErrorHandlingConfig>,
    logger: ErrorLogger,
    hook: Option<Arc<dyn ErrorHook>>,
}

impl std::fmt::Debug for ErrorHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandling")
            .field("config", &self.config)
            .field("logger", &self.logger)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl ErrorHandling {
    pub fn new(config: ErrorHandlingConfig, logger: Logger) -> Self {
        if config.enable_stack_traces {
            install_panic_hook();
        }
        let error_logger = ErrorLogger::new(logger.with_field("component", "http"), config.log_policy());
        Self {
            config: Arc::new(config),
            logger: error_logger,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: impl ErrorHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &ErrorHandlingConfig {
        &self.config
    }

    /// Install the request-id and error layers on `router` (add routes and fallback first).
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(from_fn_with_state(self.clone(), handle_errors))
                .layer(from_fn_with_state(self.clone(), recover_panics)),
        )
    }

    /// Log, give the hook a chance, then render the default body.
    pub fn respond(&self, failure: Failure, ctx: &ErrorContext) -> Response {
        match &failure {
            Failure::Single(err) => {
                self.logger.log(err);
            }
            Failure::List(list) => {
                self.logger.log_list(list);
            }
        }

        if let Some(hook) = &self.hook {
            if let Some(res) = hook.handle(&failure, ctx) {
                return mark_rendered(res);
            }
        }

        render_failure(&failure, &self.config, ctx.request_id.as_deref())
    }
}

pub async fn handle_errors(State(state): State<ErrorHandling>, mut req: Request, next: Next) -> Response {
    let ctx = context::capture(&req);
    req.extensions_mut().insert(RequestContext(ctx.clone()));

    let mut res = next.run(req).await;

    if let Some(PendingError(err)) = res.extensions_mut().remove::<PendingError>() {
        return state.respond(normalize(err, &ctx), &ctx);
    }
    if res.extensions().get::<Rendered>().is_some() || !is_error_status(res.status()) {
        return res;
    }

    let allow = res.headers().get(header::ALLOW).cloned();
    let err = foreign_error(res).await;
    let mut out = state.respond(normalize(err.into(), &ctx), &ctx);
    if let Some(allow) = allow {
        out.headers_mut().insert(header::ALLOW, allow);
    }
    out
}

fn is_error_status(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

/// Rebuild an [`HttpError`] from a plain error response; its body text becomes the message.
async fn foreign_error(res: Response) -> HttpError {
    let status = res.status();
    let text = to_bytes(res.into_body(), MAX_FOREIGN_BODY)
        .await
        .ok()
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    let message = text.unwrap_or_else(|| status.canonical_reason().unwrap_or("HTTP error").to_string());
    HttpError::new(status, message)
}

pub async fn recover_panics(State(state): State<ErrorHandling>, req: Request, next: Next) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .map(|c| c.0.clone())
        .unwrap_or_else(|| context::capture(&req));

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => {
            let stack = take_panic_backtrace();
            let mut err = AppError::from_panic(payload).with_severity(Severity::Critical);
            if let Some(stack) = stack.filter(|_| state.config.enable_stack_traces) {
                err = err.with_detail("stack", stack.to_string());
            }
            let err = err.with_context(ctx.clone());
            state.respond(Failure::Single(err), &ctx)
        }
    }
}
