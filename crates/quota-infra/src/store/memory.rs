//! In-memory quota store - the default backend and the fallback when the
//! configured store is unreachable.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use quota_core::domain::{QuotaKey, QuotaRecord};
use quota_core::error::StoreError;
use quota_core::ports::QuotaStore;

/// Quota records held in a sharded concurrent map.
///
/// Both write primitives run under the shard lock of their key, which makes
/// them atomic within the process. Data is lost on restart.
#[derive(Default)]
pub struct InMemoryQuotaStore {
    records: DashMap<QuotaKey, QuotaRecord>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn load(&self, key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError> {
        Ok(self.records.get(key).map(|record| record.clone()))
    }

    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord, StoreError> {
        match self.records.entry(record.key()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => Ok(slot.insert(record).clone()),
        }
    }

    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        next: &QuotaRecord,
    ) -> Result<bool, StoreError> {
        match self.records.get_mut(&next.key()) {
            Some(mut current) if current.revision == expected_revision => {
                *current = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
