//! Quota record entity for SeaORM.

use chrono::TimeDelta;
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use quota_core::domain::{FeatureKey, QuotaRecord};
use quota_core::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "quota_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub feature_key: String,
    pub current_usage: i64,
    pub limit_value: i64,
    pub burst_limit: Option<i64>,
    pub window_start: DateTimeWithTimeZone,
    pub window_duration_secs: i64,
    pub violation_count: i64,
    pub last_violation_at: Option<DateTimeWithTimeZone>,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTimeWithTimeZone>,
    pub revision: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn unsigned(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Conversion from SeaORM Model to Domain QuotaRecord.
impl TryFrom<Model> for QuotaRecord {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let window_duration = TimeDelta::try_seconds(model.window_duration_secs).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "window_duration_secs out of range: {}",
                model.window_duration_secs
            ))
        })?;

        let record = Self {
            user_id: model.user_id,
            feature_key: FeatureKey::from(model.feature_key),
            current_usage: unsigned("current_usage", model.current_usage)?,
            limit_value: unsigned("limit_value", model.limit_value)?,
            burst_limit: model
                .burst_limit
                .map(|burst| unsigned("burst_limit", burst))
                .transpose()?,
            window_start: model.window_start.into(),
            window_duration,
            violation_count: unsigned("violation_count", model.violation_count)?,
            last_violation_at: model.last_violation_at.map(Into::into),
            is_blocked: model.is_blocked,
            blocked_until: model.blocked_until.map(Into::into),
            revision: unsigned("revision", model.revision)?,
        };
        record
            .validate()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(record)
    }
}

/// Conversion from Domain QuotaRecord to SeaORM ActiveModel.
impl From<&QuotaRecord> for ActiveModel {
    fn from(record: &QuotaRecord) -> Self {
        Self {
            user_id: Set(record.user_id.clone()),
            feature_key: Set(record.feature_key.as_str().to_string()),
            current_usage: Set(signed(record.current_usage)),
            limit_value: Set(signed(record.limit_value)),
            burst_limit: Set(record.burst_limit.map(signed)),
            window_start: Set(record.window_start.into()),
            window_duration_secs: Set(record.window_duration.num_seconds()),
            violation_count: Set(signed(record.violation_count)),
            last_violation_at: Set(record.last_violation_at.map(Into::into)),
            is_blocked: Set(record.is_blocked),
            blocked_until: Set(record.blocked_until.map(Into::into)),
            revision: Set(signed(record.revision)),
        }
    }
}
