use std::collections::BTreeMap;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use super::duration_secs;
use super::feature::FeatureKey;
use crate::error::PolicyError;

/// Limit applied to one feature within a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLimit {
    /// Units allowed per window.
    pub limit: u64,
    #[serde(rename = "window_secs", with = "duration_secs")]
    pub window: TimeDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u64>,
}

impl FeatureLimit {
    /// Longest accepted window. Keeps `window_start + window` representable.
    pub const MAX_WINDOW: TimeDelta = TimeDelta::days(3660);

    pub fn new(limit: u64, window: TimeDelta) -> Self {
        Self {
            limit,
            window,
            burst: None,
        }
    }

    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst);
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("limit must be positive".to_string());
        }
        if self.window <= TimeDelta::zero() {
            return Err("window must be positive".to_string());
        }
        if self.window > Self::MAX_WINDOW {
            return Err(format!(
                "window of {}s exceeds the {}s maximum",
                self.window.num_seconds(),
                Self::MAX_WINDOW.num_seconds()
            ));
        }
        if let Some(burst) = self.burst {
            if burst < self.limit {
                return Err(format!("burst {burst} is below limit {}", self.limit));
            }
        }
        Ok(())
    }
}

/// How a tier treats one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeaturePolicy {
    Limited(FeatureLimit),
    Unlimited,
}

/// Per-feature policies of a single tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierPolicy {
    features: BTreeMap<FeatureKey, FeaturePolicy>,
}

impl TierPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limited(mut self, feature_key: FeatureKey, limit: FeatureLimit) -> Self {
        self.features
            .insert(feature_key, FeaturePolicy::Limited(limit));
        self
    }

    pub fn unlimited(mut self, feature_key: FeatureKey) -> Self {
        self.features.insert(feature_key, FeaturePolicy::Unlimited);
        self
    }

    pub fn feature(&self, feature_key: &FeatureKey) -> Option<&FeaturePolicy> {
        self.features.get(feature_key)
    }

    pub fn features(&self) -> impl Iterator<Item = (&FeatureKey, &FeaturePolicy)> {
        self.features.iter()
    }

    fn grants_unlimited(&self) -> bool {
        self.features
            .values()
            .any(|policy| matches!(policy, FeaturePolicy::Unlimited))
    }
}

/// Strategy table mapping tier names to their policies.
///
/// The fallback tier is applied whenever a user's tier cannot be resolved, so
/// it is required to exist and to limit every feature it lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicyTable")]
pub struct TierPolicyTable {
    fallback_tier: String,
    tiers: BTreeMap<String, TierPolicy>,
}

/// Unvalidated shape of a policy document.
#[derive(Deserialize)]
struct RawPolicyTable {
    #[serde(default = "default_fallback_tier")]
    fallback_tier: String,
    tiers: BTreeMap<String, TierPolicy>,
}

fn default_fallback_tier() -> String {
    TierPolicyTable::BASE.to_string()
}

impl TryFrom<RawPolicyTable> for TierPolicyTable {
    type Error = PolicyError;

    fn try_from(raw: RawPolicyTable) -> Result<Self, Self::Error> {
        Self::new(raw.fallback_tier, raw.tiers)
    }
}

impl TierPolicyTable {
    pub const BASE: &'static str = "base";
    pub const UNLIMITED: &'static str = "unlimited";

    pub fn new(
        fallback_tier: impl Into<String>,
        tiers: impl IntoIterator<Item = (String, TierPolicy)>,
    ) -> Result<Self, PolicyError> {
        let table = Self {
            fallback_tier: fallback_tier.into(),
            tiers: tiers.into_iter().collect(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Built-in table: a metered `base` tier and an `unlimited` tier.
    pub fn builtin() -> Self {
        let day = TimeDelta::hours(24);
        Self {
            fallback_tier: Self::BASE.to_string(),
            tiers: BTreeMap::from([
                (
                    Self::BASE.to_string(),
                    TierPolicy::new()
                        .limited(FeatureKey::scan(), FeatureLimit::new(5, day))
                        .limited(FeatureKey::generation(), FeatureLimit::new(3, day)),
                ),
                (
                    Self::UNLIMITED.to_string(),
                    TierPolicy::new()
                        .unlimited(FeatureKey::scan())
                        .unlimited(FeatureKey::generation()),
                ),
            ]),
        }
    }

    /// Parse and validate a JSON policy document.
    ///
    /// ```json
    /// {
    ///   "fallback_tier": "base",
    ///   "tiers": {
    ///     "base": { "scan-action": { "kind": "limited", "limit": 5, "window_secs": 86400 } },
    ///     "unlimited": { "scan-action": { "kind": "unlimited" } }
    ///   }
    /// }
    /// ```
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let raw: RawPolicyTable =
            serde_json::from_str(document).map_err(|e| PolicyError::Parse(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Replace the fallback tier.
    pub fn with_fallback(mut self, tier: impl Into<String>) -> Result<Self, PolicyError> {
        self.fallback_tier = tier.into();
        self.validate()?;
        Ok(self)
    }

    pub fn policy(&self, tier: &str) -> Option<&TierPolicy> {
        self.tiers.get(tier)
    }

    /// Tier name and policy, with the name borrowed from the table.
    pub fn entry(&self, tier: &str) -> Option<(&str, &TierPolicy)> {
        self.tiers
            .get_key_value(tier)
            .map(|(name, policy)| (name.as_str(), policy))
    }

    pub fn fallback_tier(&self) -> &str {
        &self.fallback_tier
    }

    /// Policy of the fallback tier.
    pub fn fallback(&self) -> &TierPolicy {
        // Every construction path runs `validate`, which requires the entry.
        &self.tiers[self.fallback_tier.as_str()]
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<(), PolicyError> {
        for (tier, policy) in &self.tiers {
            for (feature_key, feature) in policy.features() {
                if let FeaturePolicy::Limited(limit) = feature {
                    limit.validate().map_err(|reason| PolicyError::InvalidLimit {
                        tier: tier.clone(),
                        feature_key: feature_key.clone(),
                        reason,
                    })?;
                }
            }
        }

        let fallback = self
            .tiers
            .get(&self.fallback_tier)
            .ok_or_else(|| PolicyError::UnknownFallbackTier(self.fallback_tier.clone()))?;
        if fallback.grants_unlimited() {
            return Err(PolicyError::UnlimitedFallback(self.fallback_tier.clone()));
        }
        Ok(())
    }
}

impl Default for TierPolicyTable {
    fn default() -> Self {
        Self::builtin()
    }
}
