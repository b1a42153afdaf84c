//! Tier resolution with a fail-safe-restrictive fallback.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{TierPolicy, TierPolicyTable};
use crate::ports::{
    FallbackCause, ProfileError, ProfileSource, QuotaObserver, TierCache, TracingObserver,
};

/// Tier applied to a request, borrowed from the resolver's policy table.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTier<'a> {
    pub tier: &'a str,
    pub policy: &'a TierPolicy,
    /// True when the fallback tier was substituted for an unresolvable one.
    pub fallback: bool,
}

/// Maps a user to the policy of their subscription tier.
///
/// Never fails: a missing profile, an unknown tier name or a lookup error all
/// resolve to the table's fallback tier.
pub struct TierResolver {
    profiles: Arc<dyn ProfileSource>,
    policies: Arc<TierPolicyTable>,
    cache: Option<(Arc<dyn TierCache>, Duration)>,
    observer: Arc<dyn QuotaObserver>,
}

impl TierResolver {
    pub fn new(profiles: Arc<dyn ProfileSource>, policies: Arc<TierPolicyTable>) -> Self {
        Self {
            profiles,
            policies,
            cache: None,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Cache resolved tier names for `ttl`. A zero TTL disables caching.
    pub fn with_cache(mut self, cache: Arc<dyn TierCache>, ttl: Duration) -> Self {
        self.cache = (!ttl.is_zero()).then_some((cache, ttl));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn QuotaObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policies(&self) -> &TierPolicyTable {
        &self.policies
    }

    pub async fn resolve(&self, user_id: &str) -> ResolvedTier<'_> {
        let cause = match self.lookup(user_id).await {
            Ok(Some(tier)) => match self.policies.entry(&tier) {
                Some((tier, policy)) => {
                    return ResolvedTier {
                        tier,
                        policy,
                        fallback: false,
                    };
                }
                None => FallbackCause::UnknownTier(tier),
            },
            Ok(None) => FallbackCause::MissingProfile,
            Err(err) => FallbackCause::LookupFailed(err),
        };

        let fallback_tier = self.policies.fallback_tier();
        self.observer.profile_fallback(user_id, fallback_tier, &cause);

        ResolvedTier {
            tier: fallback_tier,
            policy: self.policies.fallback(),
            fallback: true,
        }
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<String>, ProfileError> {
        if let Some((cache, _)) = &self.cache {
            if let Some(tier) = cache.get(user_id).await {
                return Ok(Some(tier));
            }
        }

        let tier = self.profiles.tier_of(user_id).await?;

        if let (Some(tier), Some((cache, ttl))) = (&tier, &self.cache) {
            if self.policies.policy(tier).is_some() {
                if let Err(e) = cache.put(user_id, tier, *ttl).await {
                    tracing::debug!(user_id = %user_id, error = %e, "Failed to cache tier");
                }
            }
        }

        Ok(tier)
    }
}
