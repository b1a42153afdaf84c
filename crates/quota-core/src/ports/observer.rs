//! Observability port for anomalies the engine recovers from or reports.

use std::fmt;

use crate::domain::{QuotaKey, QuotaRecord};
use crate::error::QuotaError;

use super::profile::ProfileError;

/// Why the restrictive fallback tier was applied.
#[derive(Debug)]
pub enum FallbackCause {
    MissingProfile,
    UnknownTier(String),
    LookupFailed(ProfileError),
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackCause::MissingProfile => f.write_str("no profile found"),
            FallbackCause::UnknownTier(tier) => write!(f, "unknown tier '{tier}'"),
            FallbackCause::LookupFailed(err) => write!(f, "lookup failed: {err}"),
        }
    }
}

/// Receives engine events worth surfacing to operators.
pub trait QuotaObserver: Send + Sync {
    /// A user's tier could not be resolved and the fallback tier was used.
    fn profile_fallback(&self, user_id: &str, fallback_tier: &str, cause: &FallbackCause);

    /// A rejected attempt was recorded as a violation.
    fn violation_recorded(&self, record: &QuotaRecord);

    /// A consumption attempt failed without a decision.
    fn consume_failed(&self, key: &QuotaKey, error: &QuotaError);
}

/// Observer that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QuotaObserver for TracingObserver {
    fn profile_fallback(&self, user_id: &str, fallback_tier: &str, cause: &FallbackCause) {
        tracing::warn!(
            user_id = %user_id,
            fallback_tier = %fallback_tier,
            cause = %cause,
            "Tier resolution failed, applying fallback tier"
        );
    }

    fn violation_recorded(&self, record: &QuotaRecord) {
        tracing::info!(
            user_id = %record.user_id,
            feature_key = %record.feature_key,
            violation_count = record.violation_count,
            blocked = record.is_blocked,
            "Quota violation recorded"
        );
    }

    fn consume_failed(&self, key: &QuotaKey, error: &QuotaError) {
        tracing::error!(quota_key = %key, error = %error, "Quota evaluation failed");
    }
}
