//! Typed per-request values shared between the dispatcher, middleware and
//! the [`Context`](crate::context::Context).

use crate::app::ServerState;
use crate::session::SessionHandle;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Cross-cutting values attached to a request as it travels through the
/// mux. The dispatcher fills in `server`; middleware add the request id,
/// its logger span and the session handle.
#[derive(Clone, Default)]
pub struct RequestScope {
    pub(crate) server: Option<Arc<ServerState>>,
    pub(crate) request_id: Option<String>,
    pub(crate) logger: Option<Span>,
    pub(crate) session: Option<Arc<SessionHandle>>,
    pub(crate) response_headers: Vec<(String, String)>,
}

impl RequestScope {
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn logger(&self) -> Option<&Span> {
        self.logger.as_ref()
    }

    pub fn has_server(&self) -> bool {
        self.server.is_some()
    }

    /// Stages a header for the response produced further down the chain.
    /// Handlers find staged headers already set on `Context::response`.
    pub fn set_response_header(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        self.response_headers.retain(|(key, _)| *key != name);
        self.response_headers.push((name, value.to_string()));
    }

    pub(crate) fn attach_request_id(&mut self, id: String, logger: Span) {
        self.request_id = Some(id);
        self.logger = Some(logger);
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("server", &self.server.is_some())
            .field("request_id", &self.request_id)
            .field("session", &self.session.as_ref().map(|s| s.token()))
            .field("response_headers", &self.response_headers)
            .finish()
    }
}
