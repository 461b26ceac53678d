use crate::session::{SessionHandle, SessionManager};
use serde::Serialize;
use serde_json::Value;

/// Session accessor for the current request.
pub struct Session<'a> {
    manager: &'a SessionManager,
    handle: &'a SessionHandle,
}

impl<'a> Session<'a> {
    pub(crate) fn new(manager: &'a SessionManager, handle: &'a SessionHandle) -> Self {
        Self { manager, handle }
    }

    pub fn token(&self) -> &str {
        self.handle.token()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.manager.store().get(self.handle.token(), key)
    }

    pub fn put(&self, key: &str, value: impl Serialize) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.manager.store().put(self.handle.token(), key, value);
                self.handle.mark_modified();
            }
            Err(err) => tracing::warn!(key, error = %err, "session value not serializable"),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.manager.store().exists(self.handle.token(), key)
    }
}
