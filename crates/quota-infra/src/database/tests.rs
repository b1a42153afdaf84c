#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use quota_core::domain::{FeatureKey, FeatureLimit, QuotaKey, QuotaRecord};
    use quota_core::error::StoreError;
    use quota_core::ports::{ProfileSource, QuotaStore};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use crate::database::entity::{profile, quota_record};
    use crate::profile::PostgresProfileSource;
    use crate::store::PostgresQuotaStore;

    fn model(usage: i64, revision: i64) -> quota_record::Model {
        let now = Utc::now();
        quota_record::Model {
            user_id: "user-1".to_owned(),
            feature_key: "scan-action".to_owned(),
            current_usage: usage,
            limit_value: 3,
            burst_limit: None,
            window_start: now.into(),
            window_duration_secs: 86_400,
            violation_count: 0,
            last_violation_at: None,
            is_blocked: false,
            blocked_until: None,
            revision,
        }
    }

    fn key() -> QuotaKey {
        QuotaKey::new("user-1", FeatureKey::scan())
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_load_quota_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![model(2, 7)]])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        let record = store.load(&key()).await.unwrap().unwrap();

        assert_eq!(record.key(), key());
        assert_eq!(record.current_usage, 2);
        assert_eq!(record.limit_value, 3);
        assert_eq!(record.window_duration, TimeDelta::hours(24));
        assert_eq!(record.revision, 7);
    }

    #[tokio::test]
    async fn test_load_missing_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<quota_record::Model>::new()])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        assert_eq!(store.load(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_rejects_negative_counters() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![model(-1, 0)]])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        let err = store.load(&key()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_zero_limit() {
        let mut row = model(0, 0);
        row.limit_value = 0;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![row]])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        let err = store.load(&key()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(reason) if reason.contains("limit_value")));
    }

    #[tokio::test]
    async fn test_insert_if_absent_returns_new_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![exec(1)])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        let fresh = QuotaRecord::provision(
            key(),
            &FeatureLimit::new(3, TimeDelta::hours(24)),
            Utc::now(),
        );

        assert_eq!(store.insert_if_absent(fresh.clone()).await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_insert_if_absent_reads_back_winner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![exec(0)])
            .append_query_results(vec![vec![model(2, 4)]])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        let fresh = QuotaRecord::provision(
            key(),
            &FeatureLimit::new(3, TimeDelta::hours(24)),
            Utc::now(),
        );

        let stored = store.insert_if_absent(fresh).await.unwrap();
        assert_eq!(stored.current_usage, 2);
        assert_eq!(stored.revision, 4);
    }

    #[tokio::test]
    async fn test_compare_and_swap_reports_lost_race() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![exec(1), exec(0)])
            .into_connection();

        let store = PostgresQuotaStore::new(db);
        let mut next: QuotaRecord = model(1, 1).try_into().unwrap();
        assert!(store.compare_and_swap(0, &next).await.unwrap());

        next.revision = 2;
        assert!(!store.compare_and_swap(1, &next).await.unwrap());
    }

    #[tokio::test]
    async fn test_profile_tier_lookup() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![profile::Model {
                user_id: "user-1".to_owned(),
                tier: "unlimited".to_owned(),
                updated_at: Utc::now().into(),
            }]])
            .append_query_results(vec![Vec::<profile::Model>::new()])
            .into_connection();

        let profiles = PostgresProfileSource::new(db);

        assert_eq!(
            profiles.tier_of("user-1").await.unwrap(),
            Some("unlimited".to_string())
        );
        assert_eq!(profiles.tier_of("user-2").await.unwrap(), None);
    }
}
