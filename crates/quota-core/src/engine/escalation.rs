//! Hook for turning recorded violations into a block.

use chrono::{DateTime, Utc};

use crate::domain::QuotaRecord;

/// Decides whether a violation should suspend the user.
///
/// Called inside the atomic commit, after the violation has been counted on
/// `record`. Returning an instant after `now` blocks the feature until then.
pub trait EscalationPolicy: Send + Sync {
    fn on_violation(&self, record: &QuotaRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Default policy: violations are recorded, nobody is blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverEscalate;

impl EscalationPolicy for NeverEscalate {
    fn on_violation(&self, _record: &QuotaRecord, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }
}
