//! Profile lookup port.

use async_trait::async_trait;

/// External source of a user's subscription tier.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Tier name of `user_id`, or `None` when no profile exists.
    async fn tier_of(&self, user_id: &str) -> Result<Option<String>, ProfileError>;
}

/// Profile lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed profile: {0}")]
    Malformed(String),
}
