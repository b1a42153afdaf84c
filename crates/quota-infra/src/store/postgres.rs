//! PostgreSQL quota store via SeaORM.

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbConn, EntityTrait, QueryFilter};

use quota_core::domain::{QuotaKey, QuotaRecord};
use quota_core::error::StoreError;
use quota_core::ports::QuotaStore;

use crate::database::entity::quota_record::{self, Column, Entity};

/// Quota records in the `quota_records` table, keyed by (user, feature).
///
/// Provisioning relies on `ON CONFLICT DO NOTHING` against the composite
/// primary key; updates are conditional on the stored revision.
pub struct PostgresQuotaStore {
    db: DbConn,
}

impl PostgresQuotaStore {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    async fn find(&self, key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError> {
        Entity::find_by_id((key.user_id.clone(), key.feature_key.as_str().to_string()))
            .one(&self.db)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .map(QuotaRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl QuotaStore for PostgresQuotaStore {
    async fn load(&self, key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError> {
        self.find(key).await
    }

    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord, StoreError> {
        let inserted = Entity::insert(quota_record::ActiveModel::from(&record))
            .on_conflict(
                OnConflict::columns([Column::UserId, Column::FeatureKey])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        if inserted == 1 {
            return Ok(record);
        }

        let key = record.key();
        self.find(&key).await?.ok_or_else(|| {
            StoreError::Query(format!("{key} vanished after a conflicting insert"))
        })
    }

    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        next: &QuotaRecord,
    ) -> Result<bool, StoreError> {
        let expected = i64::try_from(expected_revision)
            .map_err(|_| StoreError::Corrupt(format!("revision {expected_revision} overflows")))?;

        let result = Entity::update_many()
            .set(quota_record::ActiveModel::from(next))
            .filter(Column::UserId.eq(next.user_id.as_str()))
            .filter(Column::FeatureKey.eq(next.feature_key.as_str()))
            .filter(Column::Revision.eq(expected))
            .exec(&self.db)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
