//! Middleware example
//!
//! A timing middleware, a bearer-token check scoped to one group and the
//! built-in request id, recovery and trailing-slash layers.

use muxkit::logging::{init_logging, Environment};
use muxkit::middleware::{Middleware, MiddlewareResult, Next};
use muxkit::{Options, Recovery, RemoveTrailingSlash, Request, RequestId, Server, ServerError};
use std::time::Instant;

struct Timing;

impl Middleware for Timing {
    fn call(&self, req: Request, next: Next) -> MiddlewareResult {
        Box::pin(async move {
            let start = Instant::now();
            let path = req.path.clone();
            let method = req.method;
            let res = next.handle(req).await;
            let status = match &res {
                Ok(res) => res.status,
                Err(err) => err.status_code(),
            };
            tracing::info!(%method, %path, status, elapsed = ?start.elapsed(), "timed");
            res
        })
    }
}

fn require_bearer(req: Request, next: Next) -> MiddlewareResult {
    Box::pin(async move {
        match req.get_header("Authorization") {
            Some(token) if token.starts_with("Bearer ") => next.handle(req).await,
            _ => Err(ServerError::BadRequest("authentication required".to_string())),
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    init_logging(Environment::Dev, "info")?;

    let mut app = Server::new(Options {
        port: 3000,
        ..Options::default()
    });
    app.middleware(Recovery)
        .middleware(RequestId)
        .middleware(RemoveTrailingSlash)
        .middleware(Timing);

    app.get("/", |ctx| async move {
        ctx.string(200, &format!("request {}", ctx.request_id()));
        Ok(())
    });

    app.group("/admin", "", |admin| {
        admin.middleware(require_bearer);
        admin.get("/stats", |ctx| async move {
            ctx.string(200, "all good");
            Ok(())
        });
        admin.get("/boom", |ctx| async move {
            if ctx.param("safe").is_empty() {
                panic!("recovered by the handler adapter");
            }
            ctx.string(200, "no panic this time");
            Ok(())
        });
    });

    app.run().await
}
