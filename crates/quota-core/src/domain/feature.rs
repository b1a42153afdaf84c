use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a gated action with its own quota.
///
/// Open-ended: any key works as long as the tier policy table has an entry
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureKey(String);

impl FeatureKey {
    /// Scanning an item.
    pub const SCAN: &'static str = "scan-action";
    /// Generating a suggestion.
    pub const GENERATION: &'static str = "generation-action";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn scan() -> Self {
        Self::new(Self::SCAN)
    }

    pub fn generation() -> Self {
        Self::new(Self::GENERATION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for FeatureKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Composite identity of a quota record: one per user and feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    pub user_id: String,
    pub feature_key: FeatureKey,
}

impl QuotaKey {
    pub fn new(user_id: impl Into<String>, feature_key: FeatureKey) -> Self {
        Self {
            user_id: user_id.into(),
            feature_key,
        }
    }
}

impl fmt::Display for QuotaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.feature_key)
    }
}
