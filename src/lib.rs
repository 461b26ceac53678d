//! # muxkit
//!
//! An HTTP server toolkit: pattern routing with named-route reverse lookup,
//! middleware chains, a per-request [`Context`], and panic recovery that
//! turns handler failures into one content-negotiated response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use muxkit::{with_name, JsonResponse, Options, RequestId, Server};
//! use muxkit::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), muxkit::ServerError> {
//!     let mut server = Server::new(Options::default());
//!     server.middleware(RequestId);
//!
//!     server.handle_fn_with("GET /users/{id}", |ctx| async move {
//!         let id = ctx.url_param("id");
//!         ctx.json(200, JsonResponse::data(200, json!({ "id": id })))?;
//!         Ok(())
//!     }, with_name("user"));
//!
//!     assert_eq!(server.route_name("user", &["id", "42"]), "/users/42");
//!     server.run().await
//! }
//! ```
//!
//! ## Errors
//!
//! Handlers return `anyhow::Result<()>`. A returned error or a panic is
//! logged and handed to [`Context::error`] (or the server's `error_func`),
//! which answers JSON requests with an error envelope, partial-page
//! requests with a `serverCtxError` trigger and everything else with the
//! `"<status>.page"` template.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod session;
pub mod static_files;
pub mod templates;
pub extern crate serde_json;

pub use app::{Options, Server};
pub use context::{arg, Context, ErrorArg, ErrorType, JsonResponse};
pub use error::{ConfigError, ServerError, ServerResult};
pub use handler::{handler_fn, ErrorFunc, Handler, HandlerResult, Outcome};
pub use http::{Method, Request, Response};
pub use middleware::{Chain, Middleware, MiddlewareResult, Next, Recovery, RemoveTrailingSlash, RequestId};
pub use router::{with_name, HandleOptions, Route, Router};
pub use session::{MemoryStore, SessionManager, SessionStore};
pub use templates::{RenderOpt, Renderer, TemplateOptions, Templates};

// Reexport serde_json
pub use serde_json::{json, Value};
