use crate::handler::panic_message;
use crate::http::{status_text, Request, Response};
use crate::middleware::{Middleware, MiddlewareResult, Next};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Turns a panic anywhere inside the chain into a plain 500.
///
/// Context handlers already recover their own panics; this layer covers
/// plain [`Handler`](crate::handler::Handler)s and middleware.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn call(&self, req: Request, next: Next) -> MiddlewareResult {
        Box::pin(async move {
            match AssertUnwindSafe(next.handle(req)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!(error = %panic_message(payload.as_ref()), "Recovered from panic");
                    let mut response = Response::text(status_text(500));
                    response.status(500).header("X-Content-Type-Options", "nosniff");
                    Ok(response)
                }
            }
        })
    }
}
