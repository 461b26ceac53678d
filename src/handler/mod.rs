//! Handler interfaces.
//!
//! [`Handler`] is the plain request → response contract every route,
//! middleware layer and mounted tree speaks. [`HandlerFunc`] adapts a
//! `Context → anyhow::Result<()>` function to it and owns panic recovery
//! and error dispatch for that function.

use crate::context::Context;
use crate::error::ServerResult;
use crate::http::{Request, Response};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use tracing::Instrument;

pub type HttpResponse = ServerResult<Response>;

/// Return type of context handlers.
pub type HandlerResult = anyhow::Result<()>;

/// Server-wide override for handler errors and recovered panics. When set it
/// replaces `Context::error` as the way failures become responses.
pub type ErrorFunc = Arc<dyn Fn(&Context, anyhow::Error) + Send + Sync>;

pub trait Handler: Send + Sync + 'static {
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse>;
}

impl<F, R> Handler for F
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: Future<Output = HttpResponse> + Send + 'static,
{
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse> {
        Box::pin((self)(req))
    }
}

/// How a context handler invocation ended.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Errored(anyhow::Error),
    Panicked(PanicReport),
}

#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
    pub backtrace: String,
}

impl PanicReport {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
            backtrace: take_panic_trace().unwrap_or_else(|| Backtrace::force_capture().to_string()),
        }
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Installs a panic hook that records the backtrace of the panicking
/// thread before unwinding starts, then defers to the previous hook.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

impl Outcome {
    /// Drives `fut` to completion, turning a panic into [`Outcome::Panicked`].
    pub async fn capture<Fut>(fut: Fut) -> Outcome
    where
        Fut: Future<Output = HandlerResult>,
    {
        install_panic_hook();
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => Outcome::Completed,
            Ok(Err(err)) => Outcome::Errored(err),
            Err(payload) => Outcome::Panicked(PanicReport::from_payload(payload)),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Adapts a `Context`-taking async function into a [`Handler`].
///
/// A returned error is logged and handed to the server's [`ErrorFunc`] when
/// one is configured, otherwise to `Context::error` with status 500. A panic
/// is logged with a backtrace and handed to the [`ErrorFunc`]; without one a
/// bare 500 is written. Successful handlers own the whole response.
pub struct HandlerFunc<F> {
    f: F,
}

impl<F> HandlerFunc<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFunc<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerFunc::new(f)
}

impl<F, Fut> Handler for HandlerFunc<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse> {
        let ctx = match Context::new(req) {
            Ok(ctx) => ctx,
            Err(err) => {
                tracing::error!(error = %err, "Failed to create context");
                return Box::pin(async { Ok(Response::new(500)) });
            }
        };

        install_panic_hook();
        // The call itself may panic before a future exists.
        let started = std::panic::catch_unwind(AssertUnwindSafe(|| (self.f)(ctx.clone())));

        Box::pin(async move {
            let outcome = match started {
                Ok(fut) => {
                    let span = ctx.log();
                    Outcome::capture(fut.instrument(span)).await
                }
                Err(payload) => Outcome::Panicked(PanicReport::from_payload(payload)),
            };
            settle(&ctx, outcome);
            Ok(ctx.finish())
        })
    }
}

fn settle(ctx: &Context, outcome: Outcome) {
    let span = ctx.log();
    let _entered = span.enter();

    match outcome {
        Outcome::Completed => {}
        Outcome::Errored(err) => {
            tracing::error!(error = %format!("{err:#}"), code = 500, "internal server error");
            match ctx.error_func() {
                Some(error_func) => error_func(ctx, err),
                None => {
                    if let Err(err) = ctx.error(500, err, Vec::new()) {
                        tracing::debug!(error = %err, "error dispatched");
                    }
                }
            }
        }
        Outcome::Panicked(report) => {
            tracing::error!(
                panic = %report.message,
                backtrace = %report.backtrace,
                "panic recovered"
            );
            match ctx.error_func() {
                Some(error_func) => {
                    let err = anyhow::anyhow!("panic: {}\n{}", report.message, report.backtrace);
                    error_func(ctx, err);
                }
                None => ctx.internal_error(),
            }
        }
    }
}
