//! The rate limiter: one atomic evaluate-and-commit per consumption attempt.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::escalation::EscalationPolicy;
use super::locks::KeyLocks;
use super::provisioner::Provisioner;
use super::tier_resolver::TierResolver;
use super::window;
use crate::clock::Clock;
use crate::domain::{
    Allowance, Decision, Denial, DenyReason, FeatureKey, FeatureLimit, FeaturePolicy, QuotaKey,
    QuotaRecord,
};
use crate::error::QuotaError;
use crate::ports::{QuotaObserver, QuotaStore};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Compare-and-swap attempts before giving up on a contended key.
    pub max_cas_attempts: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: 8,
        }
    }
}

impl LimiterConfig {
    pub fn from_env() -> Self {
        Self {
            max_cas_attempts: std::env::var("QUOTA_MAX_CAS_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(8),
        }
    }
}

/// Result of evaluating one attempt against a record snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    /// Record to commit, or `None` when nothing may change.
    pub next: Option<QuotaRecord>,
}

/// Evaluate an attempt to consume `amount` units against `current`.
///
/// Pure: the caller commits `next` with a compare-and-swap on
/// `current.revision`.
pub fn evaluate(
    current: &QuotaRecord,
    limit: &FeatureLimit,
    amount: u64,
    respect_blocks: bool,
    now: DateTime<Utc>,
    escalation: &dyn EscalationPolicy,
) -> Evaluation {
    if respect_blocks && current.block_active(now) {
        return Evaluation {
            decision: Decision::Denied(Denial {
                reason: DenyReason::Blocked,
                current_usage: current.current_usage,
                limit_value: current.limit_value,
                window_reset_at: current.reset_at(),
                blocked_until: current.blocked_until,
            }),
            next: None,
        };
    }

    let mut next = window::settle(current.clone(), limit, now);
    next.revision = current.revision + 1;

    let new_usage = next.current_usage.saturating_add(amount);
    if new_usage > next.limit_value {
        next.violation_count = next.violation_count.saturating_add(1);
        next.last_violation_at = Some(now);

        if let Some(until) = escalation.on_violation(&next, now).filter(|until| *until > now) {
            next.is_blocked = true;
            next.blocked_until = Some(until);
        }

        let decision = Decision::Denied(Denial {
            reason: DenyReason::LimitExceeded,
            current_usage: next.current_usage,
            limit_value: next.limit_value,
            window_reset_at: next.reset_at(),
            blocked_until: next.blocked_until,
        });
        return Evaluation {
            decision,
            next: Some(next),
        };
    }

    next.current_usage = new_usage;
    Evaluation {
        decision: Decision::Allowed(Allowance {
            current_usage: new_usage,
            limit_value: Some(next.limit_value),
            remaining: Some(next.remaining()),
            window_reset_at: Some(next.reset_at()),
        }),
        next: Some(next),
    }
}

/// Coordinates tier resolution, provisioning and the atomic commit.
///
/// Within one process a per-key lock serializes evaluations of the same
/// (user, feature) pair. Across processes every write is a compare-and-swap
/// on the record revision, retried a bounded number of times.
pub struct RateLimiter {
    resolver: Arc<TierResolver>,
    provisioner: Provisioner,
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
    escalation: Arc<dyn EscalationPolicy>,
    observer: Arc<dyn QuotaObserver>,
    config: LimiterConfig,
}

impl RateLimiter {
    pub fn new(
        resolver: Arc<TierResolver>,
        store: Arc<dyn QuotaStore>,
        clock: Arc<dyn Clock>,
        escalation: Arc<dyn EscalationPolicy>,
        observer: Arc<dyn QuotaObserver>,
        config: LimiterConfig,
    ) -> Self {
        Self {
            provisioner: Provisioner::new(store.clone(), clock.clone()),
            resolver,
            store,
            clock,
            locks: KeyLocks::new(),
            escalation,
            observer,
            config,
        }
    }

    /// Consume `amount` units of `feature_key`, honouring active blocks.
    pub async fn consume(
        &self,
        user_id: &str,
        feature_key: &FeatureKey,
        amount: u64,
    ) -> Result<Decision, QuotaError> {
        self.consume_with(user_id, feature_key, amount, true).await
    }

    /// Consume with explicit block handling. With `respect_blocks` off an
    /// active block is ignored, though lapsed blocks are still cleared.
    pub async fn consume_with(
        &self,
        user_id: &str,
        feature_key: &FeatureKey,
        amount: u64,
        respect_blocks: bool,
    ) -> Result<Decision, QuotaError> {
        if amount == 0 {
            return Err(QuotaError::InvalidAmount);
        }

        let resolved = self.resolver.resolve(user_id).await;
        let limit = match resolved.policy.feature(feature_key) {
            Some(FeaturePolicy::Unlimited) => {
                tracing::debug!(
                    user_id = %user_id,
                    feature_key = %feature_key,
                    tier = %resolved.tier,
                    "Unlimited tier, skipping quota store"
                );
                return Ok(Decision::unlimited());
            }
            Some(FeaturePolicy::Limited(limit)) => limit,
            None => {
                return Err(QuotaError::UnknownFeature {
                    tier: resolved.tier.to_string(),
                    feature_key: feature_key.clone(),
                });
            }
        };

        let key = QuotaKey::new(user_id, feature_key.clone());
        let _guard = self.locks.acquire(&key).await;

        let result = self.commit(&key, limit, amount, respect_blocks).await;
        match &result {
            Ok(decision) => tracing::debug!(
                quota_key = %key,
                tier = %resolved.tier,
                allowed = decision.is_allowed(),
                remaining = ?decision.remaining(),
                "Quota decision"
            ),
            Err(err) => self.observer.consume_failed(&key, err),
        }
        result
    }

    async fn commit(
        &self,
        key: &QuotaKey,
        limit: &FeatureLimit,
        amount: u64,
        respect_blocks: bool,
    ) -> Result<Decision, QuotaError> {
        for attempt in 1..=self.config.max_cas_attempts {
            let current = self.provisioner.ensure_record(key, limit).await?;
            let now = self.clock.now();

            let Evaluation { decision, next } = evaluate(
                &current,
                limit,
                amount,
                respect_blocks,
                now,
                self.escalation.as_ref(),
            );
            let Some(next) = next else {
                return Ok(decision);
            };

            if self.store.compare_and_swap(current.revision, &next).await? {
                if decision.deny_reason() == Some(DenyReason::LimitExceeded) {
                    self.observer.violation_recorded(&next);
                }
                return Ok(decision);
            }

            tracing::debug!(
                quota_key = %key,
                attempt,
                revision = current.revision,
                "Lost compare-and-swap race, re-evaluating"
            );
        }

        Err(QuotaError::StoreUnavailable(format!(
            "record {key} still contended after {} attempts",
            self.config.max_cas_attempts
        )))
    }
}
