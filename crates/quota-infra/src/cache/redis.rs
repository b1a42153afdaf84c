//! Redis tier cache, shared across server processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use quota_core::ports::{CacheError, TierCache};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether the tier cache may fall back to memory if Redis is unavailable.
    /// The quota store never falls back.
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Redis-backed tier cache.
///
/// Uses connection manager for automatic reconnection.
pub struct RedisTierCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisTierCache {
    pub async fn new(config: &RedisConfig, key_prefix: &str) -> Result<Self, CacheError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| CacheError::Connection("Connection timed out".to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis tier cache");

        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn make_key(&self, user_id: &str) -> String {
        format!("{}:tier:{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl TierCache for RedisTierCache {
    async fn get(&self, user_id: &str) -> Option<String> {
        let key = self.make_key(user_id);
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Redis GET failed");
                None
            }
        }
    }

    async fn put(&self, user_id: &str, tier: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.make_key(user_id), tier, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))
    }

    async fn invalidate(&self, user_id: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.make_key(user_id))
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}
