//! Quota store port.

use async_trait::async_trait;

use crate::domain::{QuotaKey, QuotaRecord};
use crate::error::StoreError;

/// Persistent home of quota records, one per (user, feature).
///
/// Writes go through two atomic primitives only: insert-if-absent for
/// provisioning and compare-and-swap on `revision` for every later change.
/// The engine builds its read-check-write transaction on top of them.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Fetch the record for `key`, if one was provisioned.
    async fn load(&self, key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError>;

    /// Store `record` unless a record already exists for its key.
    ///
    /// Returns whichever record is stored afterwards, so the loser of a
    /// creation race gets the winner's record back.
    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord, StoreError>;

    /// Replace the stored record with `next` if its revision still equals
    /// `expected_revision`.
    ///
    /// `next.revision` carries the new revision. Returns `Ok(false)` when
    /// another writer got there first.
    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        next: &QuotaRecord,
    ) -> Result<bool, StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
