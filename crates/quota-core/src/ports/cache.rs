use std::time::Duration;

use async_trait::async_trait;

/// Short-lived cache of resolved tier names, keyed by user.
///
/// Staleness only changes which policy applies, never counter atomicity.
#[async_trait]
pub trait TierCache: Send + Sync {
    /// Cached tier name for a user.
    async fn get(&self, user_id: &str) -> Option<String>;

    /// Remember a tier name for `ttl`.
    async fn put(&self, user_id: &str, tier: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Forget a user's cached tier.
    async fn invalidate(&self, user_id: &str) -> Result<(), CacheError>;
}

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
