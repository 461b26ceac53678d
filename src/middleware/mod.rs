mod recovery;
mod request_id;
mod trailing_slash;

pub use recovery::Recovery;
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use trailing_slash::RemoveTrailingSlash;

use crate::handler::{Handler, HttpResponse};
use crate::http::Request;
use futures::future::BoxFuture;
use std::sync::Arc;

pub type MiddlewareResult = BoxFuture<'static, HttpResponse>;

/// A layer around the rest of the chain. `next` runs everything inside it.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> MiddlewareResult;
}

impl<F> Middleware for F
where
    F: Fn(Request, Next) -> MiddlewareResult + Send + Sync + 'static,
{
    fn call(&self, req: Request, next: Next) -> MiddlewareResult {
        (self)(req, next)
    }
}

#[derive(Clone)]
pub struct Next {
    handler: Arc<dyn Handler>,
}

impl Next {
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub(crate) fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    pub async fn handle(&self, req: Request) -> HttpResponse {
        self.handler.handle(req).await
    }
}

struct Layered {
    middleware: Arc<dyn Middleware>,
    next: Next,
}

impl Handler for Layered {
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse> {
        self.middleware.call(req, self.next.clone())
    }
}

/// Ordered middleware. The first entry is the outermost layer: it sees the
/// request first and the response last.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Wraps `handler` so that `[m0, m1, m2]` becomes `m0(m1(m2(handler)))`.
    pub fn then(&self, handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
        self.middlewares
            .iter()
            .rev()
            .fold(handler, |inner, middleware| {
                let layered: Arc<dyn Handler> = Arc::new(Layered {
                    middleware: Arc::clone(middleware),
                    next: Next::from_arc(inner),
                });
                layered
            })
    }
}

impl From<Vec<Arc<dyn Middleware>>> for Chain {
    fn from(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }
}
