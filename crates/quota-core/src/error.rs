//! Domain-level error types.

use thiserror::Error;

use crate::domain::FeatureKey;

/// Errors surfaced by the quota engine to its callers.
///
/// A denial is not an error: `Denied` decisions come back as `Ok`. Anything
/// here means no decision could be made and the caller must fail closed.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("Quota store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Feature '{feature_key}' has no policy in tier '{tier}'")]
    UnknownFeature { tier: String, feature_key: FeatureKey },

    #[error("Consumption amount must be greater than zero")]
    InvalidAmount,
}

impl From<StoreError> for QuotaError {
    fn from(err: StoreError) -> Self {
        QuotaError::StoreUnavailable(err.to_string())
    }
}

/// Quota store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Store operation failed: {0}")]
    Query(String),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Tier policy table errors, raised while loading configuration.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid policy document: {0}")]
    Parse(String),

    #[error("Fallback tier '{0}' is not defined")]
    UnknownFallbackTier(String),

    #[error("Fallback tier '{0}' must not grant unlimited access")]
    UnlimitedFallback(String),

    #[error("Invalid limit for '{feature_key}' in tier '{tier}': {reason}")]
    InvalidLimit {
        tier: String,
        feature_key: FeatureKey,
        reason: String,
    },
}
