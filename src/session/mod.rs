//! Cookie-token sessions.
//!
//! The [`SessionManager`] owns the store and cookie settings and is
//! attached once to the server. [`LoadAndSave`] resolves the session token
//! per request and sends the cookie back once the session was written.

mod memory;

pub use memory::MemoryStore;

use crate::error::ServerError;
use crate::http::Request;
use crate::middleware::{Middleware, MiddlewareResult, Next};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub trait SessionStore: Send + Sync + 'static {
    fn get(&self, token: &str, key: &str) -> Option<Value>;
    fn put(&self, token: &str, key: &str, value: Value);
    fn exists(&self, token: &str, key: &str) -> bool;
}

/// The session a request is bound to.
#[derive(Debug)]
pub struct SessionHandle {
    token: String,
    modified: AtomicBool,
}

impl SessionHandle {
    pub(crate) fn new(token: String) -> Self {
        Self {
            token,
            modified: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn mark_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    lifetime: Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: impl SessionStore) -> Self {
        Self {
            store: Arc::new(store),
            cookie_name: "session".to_string(),
            lifetime: Duration::from_secs(24 * 60 * 60),
            secure: false,
        }
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// The session already bound to `req`, else the one named by its cookie,
    /// else a fresh one.
    pub fn resolve(&self, req: &Request) -> Arc<SessionHandle> {
        if let Some(session) = &req.scope().session {
            return Arc::clone(session);
        }
        let token = req
            .cookie(&self.cookie_name)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Arc::new(SessionHandle::new(token))
    }

    pub fn cookie_header(&self, session: &SessionHandle) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            session.token(),
            self.lifetime.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Binds each request to its session and emits `Set-Cookie` when the
/// handler wrote to it.
pub(crate) struct LoadAndSave {
    manager: Arc<SessionManager>,
}

impl LoadAndSave {
    pub(crate) fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

impl Middleware for LoadAndSave {
    fn call(&self, mut req: Request, next: Next) -> MiddlewareResult {
        let session = self.manager.resolve(&req);
        req.scope.session = Some(Arc::clone(&session));
        let manager = Arc::clone(&self.manager);

        Box::pin(async move {
            let mut response = next.handle(req).await?;
            if session.is_modified() {
                response
                    .header("Set-Cookie", manager.cookie_header(&session))
                    .header("Vary", "Cookie");
            }
            Ok::<_, ServerError>(response)
        })
    }
}
