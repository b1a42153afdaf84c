use chrono::{DateTime, Utc};

use super::feature::FeatureKey;
use super::record::QuotaRecord;

/// Read-only usage view of one user across every feature of their tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageStatus {
    pub user_id: String,
    pub tier: String,
    pub features: Vec<FeatureUsage>,
}

/// Usage of one feature. Limit fields are `None` for unlimited features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureUsage {
    pub feature_key: FeatureKey,
    pub used: u64,
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl FeatureUsage {
    pub fn unlimited(feature_key: FeatureKey) -> Self {
        Self {
            feature_key,
            used: 0,
            limit: None,
            remaining: None,
            reset_at: None,
            blocked_until: None,
        }
    }

    /// Project a settled record at `now`.
    pub fn from_record(record: &QuotaRecord, now: DateTime<Utc>) -> Self {
        Self {
            feature_key: record.feature_key.clone(),
            used: record.current_usage,
            limit: Some(record.limit_value),
            remaining: Some(record.remaining()),
            reset_at: Some(record.reset_at()),
            blocked_until: record
                .block_active(now)
                .then_some(record.blocked_until)
                .flatten(),
        }
    }
}

impl UsageStatus {
    pub fn feature(&self, feature_key: &FeatureKey) -> Option<&FeatureUsage> {
        self.features.iter().find(|f| &f.feature_key == feature_key)
    }
}
