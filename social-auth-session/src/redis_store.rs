use crate::SessionDataStore;
use async_trait::async_trait;
use redis::AsyncCommands;
use social_auth_core::AuthError;

/// Session data store backed by Redis.
///
/// Each browser session is one hash (`{prefix}:{session_id}`) whose TTL is
/// refreshed on every write.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    prefix: String,
    ttl_secs: i64,
}

impl RedisStore {
    /// Connect lazily to the Redis server at `url`.
    pub fn new(url: &str) -> Result<Self, AuthError> {
        let client = redis::Client::open(url)
            .map_err(|e| AuthError::Session(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            prefix: "social_auth".to_string(),
            ttl_secs: 24 * 60 * 60,
        })
    }

    /// Override the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the session TTL in seconds.
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:{session_id}", self.prefix)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AuthError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)
    }
}

fn redis_error(e: redis::RedisError) -> AuthError {
    AuthError::Session(format!("redis error: {e}"))
}

#[async_trait]
impl SessionDataStore for RedisStore {
    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), AuthError> {
        let mut conn = self.connection().await?;
        let hash = self.key(session_id);
        let _: () = conn.hset(&hash, key, value).await.map_err(redis_error)?;
        let _: () = conn
            .expire(&hash, self.ttl_secs)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AuthError> {
        let mut conn = self.connection().await?;
        conn.hget(self.key(session_id), key)
            .await
            .map_err(redis_error)
    }

    async fn clear(&self, session_id: &str, keys: &[&str]) -> Result<(), AuthError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let _: () = conn
            .hdel(self.key(session_id), keys)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}
