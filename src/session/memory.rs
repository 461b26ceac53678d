use crate::session::SessionStore;
use moka::sync::Cache;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type Values = Arc<Mutex<HashMap<String, Value>>>;

/// In-process session store. Sessions expire after `lifetime` without
/// access and the least recently used are evicted past `max_sessions`.
#[derive(Clone)]
pub struct MemoryStore {
    sessions: Cache<String, Values>,
}

impl MemoryStore {
    pub fn new(max_sessions: u64, lifetime: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(lifetime)
                .build(),
        }
    }

    fn values(&self, token: &str) -> Option<Values> {
        self.sessions.get(token)
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, token: &str, key: &str) -> Option<Value> {
        let values = self.values(token)?;
        let values = values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn put(&self, token: &str, key: &str, value: Value) {
        let values = self
            .sessions
            .get_with(token.to_string(), || Arc::new(Mutex::new(HashMap::new())));
        values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn exists(&self, token: &str, key: &str) -> bool {
        self.values(token).is_some_and(|values| {
            values
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(key)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_per_token() {
        let store = MemoryStore::new(16, Duration::from_secs(60));
        store.put("a", "user", json!("ann"));
        assert_eq!(store.get("a", "user"), Some(json!("ann")));
        assert!(store.exists("a", "user"));
        assert!(!store.exists("b", "user"));
        assert_eq!(store.get("b", "user"), None);
    }
}
