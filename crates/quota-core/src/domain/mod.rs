//! Domain entities - the core business objects.

mod decision;
mod feature;
mod policy;
mod record;
mod status;

pub use decision::{Allowance, Decision, Denial, DenyReason};
pub use feature::{FeatureKey, QuotaKey};
pub use policy::{FeatureLimit, FeaturePolicy, TierPolicy, TierPolicyTable};
pub use record::{InvalidRecord, QuotaRecord};
pub use status::{FeatureUsage, UsageStatus};

/// Serde adapter storing a `TimeDelta` as whole seconds.
pub(crate) mod duration_secs {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        TimeDelta::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom("window duration out of range"))
    }
}
