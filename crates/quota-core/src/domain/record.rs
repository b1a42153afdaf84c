use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::duration_secs;
use super::feature::{FeatureKey, QuotaKey};
use super::policy::FeatureLimit;

/// Usage accounting for one user and one feature.
///
/// Created lazily on the first consumption attempt, reset in place when its
/// window rolls over, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub user_id: String,
    pub feature_key: FeatureKey,
    /// Units consumed in the active window.
    pub current_usage: u64,
    /// Maximum units per window.
    pub limit_value: u64,
    /// Reserved ceiling above `limit_value`. Carried and validated only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_limit: Option<u64>,
    pub window_start: DateTime<Utc>,
    #[serde(rename = "window_duration_secs", with = "duration_secs")]
    pub window_duration: TimeDelta,
    /// Rejections for exceeding the limit within the active window.
    pub violation_count: u64,
    pub last_violation_at: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    /// Optimistic concurrency token; bumped by one on every committed write.
    pub revision: u64,
}

/// A record that breaks one of the model's invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}: {reason}")]
pub struct InvalidRecord {
    pub key: String,
    pub reason: &'static str,
}

impl QuotaRecord {
    /// Fresh record for a first-time (user, feature) pair.
    pub fn provision(key: QuotaKey, limit: &FeatureLimit, now: DateTime<Utc>) -> Self {
        Self {
            user_id: key.user_id,
            feature_key: key.feature_key,
            current_usage: 0,
            limit_value: limit.limit,
            burst_limit: limit.burst,
            window_start: now,
            window_duration: limit.window,
            violation_count: 0,
            last_violation_at: None,
            is_blocked: false,
            blocked_until: None,
            revision: 0,
        }
    }

    pub fn key(&self) -> QuotaKey {
        QuotaKey::new(self.user_id.clone(), self.feature_key.clone())
    }

    /// Instant at which the active window ends.
    ///
    /// Saturates at the latest representable instant.
    pub fn reset_at(&self) -> DateTime<Utc> {
        self.window_start
            .checked_add_signed(self.window_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn remaining(&self) -> u64 {
        self.limit_value.saturating_sub(self.current_usage)
    }

    /// Whether a suspension is in force at `now`.
    ///
    /// A block without an end instant cannot be evaluated and counts as
    /// lapsed.
    pub fn block_active(&self, now: DateTime<Utc>) -> bool {
        self.is_blocked && self.blocked_until.is_some_and(|until| now < until)
    }

    /// Check the limit and window fields a store hands back.
    ///
    /// A block without `blocked_until` passes: it is treated as lapsed.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        let fail = |reason| {
            Err(InvalidRecord {
                key: self.key().to_string(),
                reason,
            })
        };

        if self.limit_value == 0 {
            return fail("limit_value must be positive");
        }
        if self.burst_limit.is_some_and(|burst| burst < self.limit_value) {
            return fail("burst_limit must not be below limit_value");
        }
        if self.window_duration <= TimeDelta::zero() {
            return fail("window_duration must be positive");
        }
        if self.window_duration > FeatureLimit::MAX_WINDOW {
            return fail("window_duration is too long");
        }
        Ok(())
    }
}
