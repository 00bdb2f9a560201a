//! # Social Auth Session
//!
//! Key/value storage scoped to one browser session. The login flow keeps its
//! CSRF state and the access token here between the redirect and the callback.

use async_trait::async_trait;
use social_auth_core::{AuthError, SameSite};
use std::sync::Arc;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "store-redis")]
mod redis_store;
#[cfg(feature = "store-redis")]
pub use redis_store::RedisStore;

/// Session key holding the pending CSRF state.
pub const OAUTH2_STATE_KEY: &str = "oauth2state";
/// Session key holding the serialized access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Keys nullified when a login attempt fails.
pub const SESSION_KEYS_TO_NULLIFY: [&str; 2] = [ACCESS_TOKEN_KEY, OAUTH2_STATE_KEY];

/// Backing store for per-session values.
///
/// Values written in one request must be readable in the next request of the
/// same browser session and never visible to another session.
#[async_trait]
pub trait SessionDataStore: Send + Sync + 'static {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), AuthError>;
    /// Read the value under `key`.
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AuthError>;
    /// Remove the given keys. Missing keys are ignored.
    async fn clear(&self, session_id: &str, keys: &[&str]) -> Result<(), AuthError>;
}

/// Request-scoped view of the store for one browser session.
///
/// Keys are namespaced by an optional prefix so that two providers never see
/// each other's state.
#[derive(Clone)]
pub struct SessionDataHandler {
    store: Arc<dyn SessionDataStore>,
    session_id: String,
    prefix: Option<String>,
}

impl SessionDataHandler {
    /// Bind `store` to the browser session `session_id`.
    pub fn new(store: Arc<dyn SessionDataStore>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            prefix: None,
        }
    }

    /// A view of the same session whose keys are prefixed with `social_auth_{provider_id}_`.
    pub fn for_provider(&self, provider_id: &str) -> Self {
        Self {
            store: self.store.clone(),
            session_id: self.session_id.clone(),
            prefix: Some(format!("social_auth_{provider_id}")),
        }
    }

    /// The browser session this handler is bound to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key.to_string(),
        }
    }

    /// Store `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.store.set(&self.session_id, &self.key(key), value).await
    }

    /// Read the value under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.store.get(&self.session_id, &self.key(key)).await
    }

    /// Remove the given keys.
    pub async fn clear(&self, keys: &[&str]) -> Result<(), AuthError> {
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.store.clear(&self.session_id, &keys).await
    }

    /// Remove the access token and the pending state of a failed login.
    pub async fn nullify_session_keys(&self) -> Result<(), AuthError> {
        self.clear(&SESSION_KEYS_TO_NULLIFY).await
    }
}

/// Configuration for the browser-session cookie.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the cookie carrying the browser-session id.
    pub cookie_name: String,
    /// Cookie path.
    pub path: String,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Whether the cookie is hidden from scripts.
    pub http_only: bool,
    /// Cross-site policy of the cookie.
    pub same_site: SameSite,
    /// The maximum age of the cookie.
    pub max_age: Option<chrono::Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "social_auth_session".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            // Lax keeps the cookie on the top-level redirect back from the provider.
            same_site: SameSite::Lax,
            max_age: Some(chrono::Duration::hours(24)),
        }
    }
}
