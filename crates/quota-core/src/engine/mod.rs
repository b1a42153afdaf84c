//! The quota engine: tier resolution, provisioning, window accounting and
//! the atomic consume operation, wired together behind [`QuotaEngine`].

mod escalation;
mod limiter;
mod locks;
mod provisioner;
mod status;
mod tier_resolver;
pub mod window;

use std::sync::Arc;
use std::time::Duration;

pub use escalation::{EscalationPolicy, NeverEscalate};
pub use limiter::{Evaluation, LimiterConfig, RateLimiter, evaluate};
pub use locks::{KeyGuard, KeyLocks};
pub use provisioner::Provisioner;
pub use status::UsageStatusReporter;
pub use tier_resolver::{ResolvedTier, TierResolver};

use crate::clock::{Clock, SystemClock};
use crate::domain::{Decision, FeatureKey, TierPolicyTable, UsageStatus};
use crate::error::QuotaError;
use crate::ports::{ProfileSource, QuotaObserver, QuotaStore, TierCache, TracingObserver};

/// Entry point used by request handlers.
pub struct QuotaEngine {
    resolver: Arc<TierResolver>,
    limiter: RateLimiter,
    reporter: UsageStatusReporter,
    store: Arc<dyn QuotaStore>,
}

impl QuotaEngine {
    pub fn builder(
        store: Arc<dyn QuotaStore>,
        profiles: Arc<dyn ProfileSource>,
        policies: TierPolicyTable,
    ) -> QuotaEngineBuilder {
        QuotaEngineBuilder {
            store,
            profiles,
            policies,
            clock: Arc::new(SystemClock),
            tier_cache: None,
            escalation: Arc::new(NeverEscalate),
            observer: Arc::new(TracingObserver),
            config: LimiterConfig::default(),
        }
    }

    /// Consume `amount` units, refusing while the user is blocked.
    pub async fn consume(
        &self,
        user_id: &str,
        feature_key: &FeatureKey,
        amount: u64,
    ) -> Result<Decision, QuotaError> {
        self.limiter.consume(user_id, feature_key, amount).await
    }

    pub async fn consume_with(
        &self,
        user_id: &str,
        feature_key: &FeatureKey,
        amount: u64,
        respect_blocks: bool,
    ) -> Result<Decision, QuotaError> {
        self.limiter
            .consume_with(user_id, feature_key, amount, respect_blocks)
            .await
    }

    pub async fn status(&self, user_id: &str) -> Result<UsageStatus, QuotaError> {
        self.reporter.status(user_id).await
    }

    pub fn policies(&self) -> &TierPolicyTable {
        self.resolver.policies()
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }
}

/// Builder for [`QuotaEngine`]. Only the store, profile source and policy
/// table are required.
pub struct QuotaEngineBuilder {
    store: Arc<dyn QuotaStore>,
    profiles: Arc<dyn ProfileSource>,
    policies: TierPolicyTable,
    clock: Arc<dyn Clock>,
    tier_cache: Option<(Arc<dyn TierCache>, Duration)>,
    escalation: Arc<dyn EscalationPolicy>,
    observer: Arc<dyn QuotaObserver>,
    config: LimiterConfig,
}

impl QuotaEngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tier_cache(mut self, cache: Arc<dyn TierCache>, ttl: Duration) -> Self {
        self.tier_cache = Some((cache, ttl));
        self
    }

    pub fn escalation(mut self, escalation: Arc<dyn EscalationPolicy>) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn QuotaObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(mut self, config: LimiterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> QuotaEngine {
        let mut resolver = TierResolver::new(self.profiles, Arc::new(self.policies))
            .with_observer(self.observer.clone());
        if let Some((cache, ttl)) = self.tier_cache {
            resolver = resolver.with_cache(cache, ttl);
        }
        let resolver = Arc::new(resolver);

        let limiter = RateLimiter::new(
            resolver.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.escalation,
            self.observer,
            self.config,
        );
        let reporter = UsageStatusReporter::new(resolver.clone(), self.store.clone(), self.clock);

        QuotaEngine {
            resolver,
            limiter,
            reporter,
            store: self.store,
        }
    }
}
