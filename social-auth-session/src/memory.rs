use crate::SessionDataStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use social_auth_core::AuthError;
use std::collections::HashMap;
use std::sync::RwLock;

struct SessionEntry {
    values: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// In-process session data store.
///
/// Every session expires `ttl` after its last write. Expired sessions are
/// swept whenever a new session is created. Suitable for a single server
/// process and for tests.
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

impl MemoryStore {
    /// Create a store whose sessions live `ttl` after their last write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .read()
            .map(|sessions| sessions.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    /// Whether no live session holds data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired session.
    pub fn purge_expired(&self) -> Result<usize, AuthError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        Ok(before - sessions.len())
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Session("memory store lock poisoned".to_string())
}

#[async_trait]
impl SessionDataStore for MemoryStore {
    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), AuthError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        // A new session id is the point where abandoned sessions accumulate.
        if !sessions.contains_key(session_id) {
            sessions.retain(|_, entry| entry.expires_at > now);
        }
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                values: HashMap::new(),
                expires_at: now,
            });
        if entry.expires_at <= now {
            entry.values.clear();
        }
        entry.values.insert(key.to_string(), value.to_string());
        entry.expires_at = now + self.ttl;
        Ok(())
    }

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AuthError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions
            .get(session_id)
            .filter(|entry| entry.expires_at > Utc::now())
            .and_then(|entry| entry.values.get(key).cloned()))
    }

    async fn clear(&self, session_id: &str, keys: &[&str]) -> Result<(), AuthError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        if let Some(entry) = sessions.get_mut(session_id) {
            for key in keys {
                entry.values.remove(*key);
            }
            if entry.values.is_empty() {
                sessions.remove(session_id);
            }
        }
        Ok(())
    }
}
