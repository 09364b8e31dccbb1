use std::{collections::HashMap, sync::Mutex};

use serde_json::Value;

/// In-process session state, keyed by session id. A thin, thread-safe map;
/// unlike [`super::store::MemoryStore`] it is not persisted to disk.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session_id: &str, key: &str, value: Value) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    #[must_use]
    pub fn get(&self, session_id: &str, key: &str) -> Option<Value> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(session_id)?.get(key).cloned()
    }

    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let store = SessionStore::new();
        store.set("session-1", "last_query", Value::String("hello".into()));
        assert_eq!(
            store.get("session-1", "last_query"),
            Some(Value::String("hello".into()))
        );
    }

    #[test]
    fn clear_removes_all_keys_for_a_session() {
        let store = SessionStore::new();
        store.set("session-1", "key", Value::Bool(true));
        store.clear("session-1");
        assert_eq!(store.get("session-1", "key"), None);
    }
}
