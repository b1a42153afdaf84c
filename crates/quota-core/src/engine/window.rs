//! Window accounting: expiry checks and the whole-window reset.

use chrono::{DateTime, Utc};

use crate::domain::{FeatureLimit, QuotaRecord};

/// Whether the record's window has ended at `now`.
pub fn is_expired(record: &QuotaRecord, now: DateTime<Utc>) -> bool {
    now >= record.reset_at()
}

/// Reset the record if its window has ended.
///
/// A reset starts a new window at `now` and clears usage together with the
/// violation and block state of the previous window. Abuse history does not
/// carry across windows.
pub fn rollover(mut record: QuotaRecord, now: DateTime<Utc>) -> QuotaRecord {
    if !is_expired(&record, now) {
        return record;
    }

    record.current_usage = 0;
    record.window_start = now;
    record.violation_count = 0;
    record.is_blocked = false;
    record.blocked_until = None;
    record
}

/// Bring a record up to date at `now` before it is evaluated or displayed.
///
/// Drops a lapsed block, applies the tier's current limit, then rolls the
/// window. Active blocks are left in place.
pub fn settle(mut record: QuotaRecord, limit: &FeatureLimit, now: DateTime<Utc>) -> QuotaRecord {
    if record.is_blocked && !record.block_active(now) {
        record.is_blocked = false;
        record.blocked_until = None;
    }

    record.limit_value = limit.limit;
    record.window_duration = limit.window;
    record.burst_limit = limit.burst;

    rollover(record, now)
}
