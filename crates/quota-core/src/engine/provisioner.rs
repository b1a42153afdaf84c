//! Lazy, idempotent creation of quota records.

use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{FeatureLimit, QuotaKey, QuotaRecord};
use crate::error::StoreError;
use crate::ports::QuotaStore;

/// Guarantees a record exists before a key is evaluated.
pub struct Provisioner {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
}

impl Provisioner {
    pub fn new(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Return the stored record for `key`, creating it from `limit` if absent.
    ///
    /// Concurrent first-time callers all end up with the same record: the
    /// store keeps the first insert and hands it back to everyone else.
    pub async fn ensure_record(
        &self,
        key: &QuotaKey,
        limit: &FeatureLimit,
    ) -> Result<QuotaRecord, StoreError> {
        if let Some(record) = self.store.load(key).await? {
            return Ok(record);
        }

        let fresh = QuotaRecord::provision(key.clone(), limit, self.clock.now());
        let stored = self.store.insert_if_absent(fresh).await?;

        tracing::debug!(
            quota_key = %key,
            limit = stored.limit_value,
            revision = stored.revision,
            "Quota record provisioned"
        );
        Ok(stored)
    }
}
