//! Per-request handler context.
//!
//! A [`Context`] is built by the handler adapter for every request. It owns
//! the request, buffers the response and carries the one-shot error
//! dispatch flag. Clones share the same request state.

mod error_page;
mod hx;
mod json;
mod session;
mod writer;

pub use error_page::{arg, ErrorArg, ErrorMessage};
pub use hx::{Hx, Trigger, HX_REDIRECT, HX_REQUEST, HX_TRIGGER, HX_TRIGGER_AFTER_SWAP};
pub use json::{ErrorType, JsonResponse};
pub use session::Session;
pub use writer::ResponseWriter;

use crate::app::ServerState;
use crate::error::{ServerError, ServerResult};
use crate::handler::ErrorFunc;
use crate::http::{Request, Response, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
use crate::session::SessionHandle;
use crate::templates::RenderOpt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Span;

#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    request: Request,
    server: Arc<ServerState>,
    session: Option<Arc<SessionHandle>>,
    response: Mutex<ResponseWriter>,
    trigger: Mutex<PendingTrigger>,
    error_dispatched: AtomicBool,
}

#[derive(Default)]
struct PendingTrigger {
    trigger: Trigger,
    overridden: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Context {
    /// Binds a context to `req`. Fails when the request did not come
    /// through a server dispatcher.
    pub fn new(req: Request) -> ServerResult<Self> {
        let server = req.scope.server.clone().ok_or(ServerError::MissingServer)?;
        let session = server
            .sessions
            .as_ref()
            .map(|manager| manager.resolve(&req));
        let response = ResponseWriter::with_headers(&req.scope.response_headers);

        Ok(Self {
            inner: Arc::new(Inner {
                request: req,
                server,
                session,
                response: Mutex::new(response),
                trigger: Mutex::new(PendingTrigger::default()),
                error_dispatched: AtomicBool::new(false),
            }),
        })
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// The buffered response. Do not hold the guard across an `.await`.
    pub fn response(&self) -> MutexGuard<'_, ResponseWriter> {
        lock(&self.inner.response)
    }

    /// Writes `text` as `text/plain` with `code`.
    pub fn string(&self, code: u16, text: &str) {
        let mut response = self.response();
        response.set_default_content_type(CONTENT_TYPE_TEXT);
        response.write_header(code);
        response.write(text.as_bytes());
    }

    /// Writes the JSON envelope. The status goes out even when encoding
    /// fails.
    pub fn json(&self, status: u16, mut data: JsonResponse) -> Result<(), ServerError> {
        let mut response = self.response();
        response.set_default_content_type(CONTENT_TYPE_JSON);
        response.write_header(status);

        data.derive_error_type();
        let mut body = serde_json::to_vec(&data)?;
        body.push(b'\n');
        response.write(&body);
        Ok(())
    }

    /// Renders through the configured [`Renderer`](crate::templates::Renderer)
    /// into a buffer, then writes it. A failed render leaves the response
    /// untouched.
    pub fn render(&self, status: u16, opts: RenderOpt) -> Result<(), ServerError> {
        let renderer = self
            .inner
            .server
            .renderer
            .as_ref()
            .ok_or(ServerError::RendererNotConfigured)?;

        let mut out = Vec::new();
        renderer
            .render(&mut out, &opts)
            .map_err(|err| ServerError::RenderError(format!("{err:#}")))?;

        let mut response = self.response();
        if !opts.not_done {
            response.set_default_content_type(CONTENT_TYPE_HTML);
            response.write_header(status);
        }
        response.write(&out);
        Ok(())
    }

    /// 303 to `url`, or an `HX-Redirect` for partial-page requests.
    pub fn redirect(&self, url: &str) {
        let hx = self.hx();
        if hx.is_hx_request() {
            hx.redirect(url);
            return;
        }
        let mut response = self.response();
        response.set_header("Location", url);
        response.write_header(303);
    }

    pub fn status(&self, code: u16) {
        self.response().write_header(code);
    }

    pub fn hx(&self) -> Hx<'_> {
        Hx::new(self)
    }

    /// Events sent in `HX-Trigger` when the handler returns. An error
    /// dispatched to a partial-page request replaces them.
    pub fn trigger(&self) -> TriggerGuard<'_> {
        TriggerGuard {
            pending: lock(&self.inner.trigger),
        }
    }

    /// The request span when the request-id middleware ran, else the
    /// server span, else a disabled span.
    pub fn log(&self) -> Span {
        self.inner
            .request
            .scope
            .logger
            .clone()
            .or_else(|| self.inner.server.logger.clone())
            .unwrap_or_else(Span::none)
    }

    pub fn request_id(&self) -> String {
        match self.inner.request.scope.request_id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                tracing::debug!("request id not found, check that the RequestId middleware is installed");
                String::new()
            }
        }
    }

    pub fn session(&self) -> Option<Session<'_>> {
        let manager = self.inner.server.sessions.as_deref()?;
        let handle = self.inner.session.as_deref()?;
        Some(Session::new(manager, handle))
    }

    /// Value captured by the `{key}` segment of the matched route, or `""`.
    pub fn url_param(&self, key: &str) -> String {
        self.inner
            .request
            .params
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Form body value for `key`, falling back to the query string.
    pub fn param(&self, key: &str) -> String {
        let request = &self.inner.request;
        request
            .body
            .form()
            .remove(key)
            .or_else(|| request.query.get(key).cloned())
            .unwrap_or_default()
    }

    pub fn route_name(&self, name: &str, params: &[&str]) -> String {
        self.inner.server.route_names.resolve(name, params)
    }

    pub fn is_error_dispatched(&self) -> bool {
        self.inner.error_dispatched.load(Ordering::Acquire)
    }

    pub(crate) fn error_func(&self) -> Option<ErrorFunc> {
        self.inner.server.error_func.clone()
    }

    /// Bare 500 for failures nothing else handled. A response that already
    /// has a status keeps it.
    pub(crate) fn internal_error(&self) {
        let mut response = self.response();
        if response.wrote_header() {
            return;
        }
        response.clear_body();
        response.set_header("Content-Type", CONTENT_TYPE_TEXT);
        response.set_header("X-Content-Type-Options", "nosniff");
        response.write_header(500);
        response.write(b"Internal Server Error\n");
    }

    fn override_trigger(&self) {
        let mut pending = lock(&self.inner.trigger);
        pending.trigger.clear();
        pending.overridden = true;
    }

    /// Takes the buffered response, flushing pending triggers.
    pub(crate) fn finish(&self) -> Response {
        {
            let pending = lock(&self.inner.trigger);
            if !pending.overridden && !pending.trigger.is_empty() {
                let mut response = self.response();
                if response.header(HX_TRIGGER).is_none() {
                    response.set_header(HX_TRIGGER, pending.trigger.header_value());
                }
            }
        }
        std::mem::take(&mut *self.response()).into_response()
    }
}

/// Locked access to the pending [`Trigger`].
pub struct TriggerGuard<'a> {
    pending: MutexGuard<'a, PendingTrigger>,
}

impl std::ops::Deref for TriggerGuard<'_> {
    type Target = Trigger;

    fn deref(&self) -> &Trigger {
        &self.pending.trigger
    }
}

impl std::ops::DerefMut for TriggerGuard<'_> {
    fn deref_mut(&mut self) -> &mut Trigger {
        &mut self.pending.trigger
    }
}
