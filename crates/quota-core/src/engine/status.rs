//! Read-only usage reporting.

use std::sync::Arc;

use super::tier_resolver::TierResolver;
use super::window;
use crate::clock::Clock;
use crate::domain::{FeaturePolicy, FeatureUsage, QuotaKey, QuotaRecord, UsageStatus};
use crate::error::QuotaError;
use crate::ports::QuotaStore;

/// Reports a user's usage across every feature of their tier.
///
/// Never writes: records that do not exist yet are reported as fresh, and
/// stored records are rolled and un-blocked in memory only. A record under an
/// active block is reported as stored, the way the next consume sees it.
pub struct UsageStatusReporter {
    resolver: Arc<TierResolver>,
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
}

impl UsageStatusReporter {
    pub fn new(
        resolver: Arc<TierResolver>,
        store: Arc<dyn QuotaStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            store,
            clock,
        }
    }

    pub async fn status(&self, user_id: &str) -> Result<UsageStatus, QuotaError> {
        let resolved = self.resolver.resolve(user_id).await;
        let now = self.clock.now();

        let mut features = Vec::new();
        for (feature_key, policy) in resolved.policy.features() {
            let usage = match policy {
                FeaturePolicy::Unlimited => FeatureUsage::unlimited(feature_key.clone()),
                FeaturePolicy::Limited(limit) => {
                    let key = QuotaKey::new(user_id, feature_key.clone());
                    let record = match self.store.load(&key).await? {
                        Some(record) => record,
                        None => QuotaRecord::provision(key, limit, now),
                    };
                    if record.block_active(now) {
                        FeatureUsage::from_record(&record, now)
                    } else {
                        FeatureUsage::from_record(&window::settle(record, limit, now), now)
                    }
                }
            };
            features.push(usage);
        }

        Ok(UsageStatus {
            user_id: user_id.to_string(),
            tier: resolved.tier.to_string(),
            features,
        })
    }
}
