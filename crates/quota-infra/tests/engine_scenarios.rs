//! End-to-end engine behavior against the in-memory adapters.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use quota_core::domain::{
    Decision, DenyReason, FeatureKey, FeatureLimit, QuotaKey, QuotaRecord, TierPolicy,
    TierPolicyTable,
};
use quota_core::engine::EscalationPolicy;
use quota_core::error::{QuotaError, StoreError};
use quota_core::ports::{
    FallbackCause, ProfileError, ProfileSource, QuotaObserver, QuotaStore, TierCache,
};
use quota_core::{Clock, LimiterConfig, ManualClock, QuotaEngine};
use quota_infra::{InMemoryQuotaStore, InMemoryTierCache, StaticProfileDirectory};

const USER: &str = "user-1";

fn policies() -> TierPolicyTable {
    TierPolicyTable::new(
        TierPolicyTable::BASE,
        [
            (
                TierPolicyTable::BASE.to_string(),
                TierPolicy::new()
                    .limited(FeatureKey::scan(), FeatureLimit::new(3, TimeDelta::hours(24)))
                    .limited(
                        FeatureKey::generation(),
                        FeatureLimit::new(1, TimeDelta::hours(24)),
                    ),
            ),
            (
                "pro".to_string(),
                TierPolicy::new()
                    .limited(FeatureKey::scan(), FeatureLimit::new(10, TimeDelta::hours(24)))
                    .unlimited(FeatureKey::generation()),
            ),
            (
                TierPolicyTable::UNLIMITED.to_string(),
                TierPolicy::new()
                    .unlimited(FeatureKey::scan())
                    .unlimited(FeatureKey::generation()),
            ),
        ],
    )
    .unwrap()
}

struct Harness {
    engine: Arc<QuotaEngine>,
    store: Arc<InMemoryQuotaStore>,
    profiles: Arc<StaticProfileDirectory>,
    clock: ManualClock,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryQuotaStore::new());
    let profiles = Arc::new(StaticProfileDirectory::new());
    profiles.assign(USER, TierPolicyTable::BASE);
    let clock = ManualClock::default();

    let engine = QuotaEngine::builder(store.clone(), profiles.clone(), policies())
        .clock(Arc::new(clock.clone()))
        .build();

    Harness {
        engine: Arc::new(engine),
        store,
        profiles,
        clock,
    }
}

fn scan_key() -> QuotaKey {
    QuotaKey::new(USER, FeatureKey::scan())
}

async fn seed(store: &InMemoryQuotaStore, now: DateTime<Utc>, usage: u64) -> QuotaRecord {
    let mut record = QuotaRecord::provision(
        scan_key(),
        &FeatureLimit::new(3, TimeDelta::hours(24)),
        now,
    );
    record.current_usage = usage;
    store.insert_if_absent(record).await.unwrap()
}

#[tokio::test]
async fn sequential_calls_stop_at_the_limit() {
    let h = harness();
    let scan = FeatureKey::scan();

    for expected_remaining in [2, 1, 0] {
        let decision = h.engine.consume(USER, &scan, 1).await.unwrap();
        assert_eq!(decision.remaining(), Some(expected_remaining));
    }

    let denied = h.engine.consume(USER, &scan, 1).await.unwrap();
    assert_eq!(denied.deny_reason(), Some(DenyReason::LimitExceeded));

    let record = h.store.load(&scan_key()).await.unwrap().unwrap();
    assert_eq!(record.current_usage, 3);
    assert_eq!(record.violation_count, 1);
    assert_eq!(record.last_violation_at, Some(h.clock.now()));
}

#[tokio::test]
async fn expired_window_resets_usage() {
    let h = harness();
    let start = h.clock.now();
    seed(&h.store, start - TimeDelta::hours(24) - TimeDelta::seconds(1), 3).await;

    let decision = h.engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();

    assert_eq!(decision.remaining(), Some(2));
    assert_eq!(
        decision.window_reset_at(),
        Some(start + TimeDelta::hours(24))
    );
    let record = h.store.load(&scan_key()).await.unwrap().unwrap();
    assert_eq!(record.current_usage, 1);
    assert_eq!(record.window_start, start);
}

#[tokio::test]
async fn unlimited_tier_never_touches_the_store() {
    let h = harness();
    h.profiles.assign(USER, TierPolicyTable::UNLIMITED);

    for _ in 0..1000 {
        let decision = h.engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();
        match decision {
            Decision::Allowed(allowance) => assert!(allowance.is_unlimited()),
            other => panic!("expected unlimited allowance, got {other:?}"),
        }
    }

    assert!(h.store.is_empty());
}

#[tokio::test]
async fn active_block_denies_until_it_lapses() {
    let h = harness();
    let now = h.clock.now();
    let mut record = QuotaRecord::provision(
        scan_key(),
        &FeatureLimit::new(3, TimeDelta::hours(24)),
        now,
    );
    record.is_blocked = true;
    record.blocked_until = Some(now + TimeDelta::minutes(10));
    h.store.insert_if_absent(record).await.unwrap();

    let denied = h.engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();
    match &denied {
        Decision::Denied(denial) => {
            assert_eq!(denial.reason, DenyReason::Blocked);
            assert_eq!(denial.blocked_until, Some(now + TimeDelta::minutes(10)));
        }
        other => panic!("expected block, got {other:?}"),
    }
    let untouched = h.store.load(&scan_key()).await.unwrap().unwrap();
    assert_eq!(untouched.current_usage, 0);
    assert_eq!(untouched.revision, 0);

    h.clock.advance(TimeDelta::minutes(10));
    let allowed = h.engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();
    assert!(allowed.is_allowed());

    let cleared = h.store.load(&scan_key()).await.unwrap().unwrap();
    assert!(!cleared.is_blocked);
    assert_eq!(cleared.blocked_until, None);
    assert_eq!(cleared.current_usage, 1);
}

#[tokio::test]
async fn ignoring_blocks_still_enforces_the_limit() {
    let h = harness();
    let now = h.clock.now();
    let mut record = seed(&h.store, now, 0).await;
    record.is_blocked = true;
    record.blocked_until = Some(now + TimeDelta::minutes(10));
    record.revision = 1;
    assert!(h.store.compare_and_swap(0, &record).await.unwrap());

    let decision = h
        .engine
        .consume_with(USER, &FeatureKey::scan(), 3, false)
        .await
        .unwrap();
    assert_eq!(decision.remaining(), Some(0));

    let over = h
        .engine
        .consume_with(USER, &FeatureKey::scan(), 1, false)
        .await
        .unwrap();
    assert_eq!(over.deny_reason(), Some(DenyReason::LimitExceeded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_at_the_edge_admit_exactly_one() {
    let h = harness();
    seed(&h.store, h.clock.now(), 2).await;

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.consume(USER, &FeatureKey::scan(), 1).await })
        })
        .collect();

    let mut allowed = 0;
    let mut denied = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            Decision::Allowed(_) => allowed += 1,
            Decision::Denied(denial) => {
                assert_eq!(denial.reason, DenyReason::LimitExceeded);
                denied += 1;
            }
        }
    }
    assert_eq!((allowed, denied), (1, 1));

    let record = h.store.load(&scan_key()).await.unwrap().unwrap();
    assert_eq!(record.current_usage, 3);
    assert_eq!(record.violation_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engines_sharing_a_store_never_overshoot() {
    let store = Arc::new(InMemoryQuotaStore::new());
    let profiles = Arc::new(StaticProfileDirectory::new());
    let clock = ManualClock::default();
    let engines: Vec<Arc<QuotaEngine>> = (0..2)
        .map(|_| {
            Arc::new(
                QuotaEngine::builder(store.clone(), profiles.clone(), policies())
                    .clock(Arc::new(clock.clone()))
                    .config(LimiterConfig {
                        max_cas_attempts: 64,
                    })
                    .build(),
            )
        })
        .collect();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = engines[i % 2].clone();
        tasks.push(tokio::spawn(async move {
            engine.consume(USER, &FeatureKey::scan(), 1).await
        }));
    }

    let mut allowed = 0;
    for task in tasks {
        if task.await.unwrap().unwrap().is_allowed() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 3);

    let record = store.load(&scan_key()).await.unwrap().unwrap();
    assert_eq!(record.current_usage, 3);
    assert_eq!(record.violation_count, 17);
}

#[tokio::test]
async fn oversized_amount_is_denied_without_partial_consumption() {
    let h = harness();

    let denied = h.engine.consume(USER, &FeatureKey::scan(), 4).await.unwrap();
    assert_eq!(denied.deny_reason(), Some(DenyReason::LimitExceeded));

    let allowed = h.engine.consume(USER, &FeatureKey::scan(), 3).await.unwrap();
    assert_eq!(allowed.remaining(), Some(0));
}

#[tokio::test]
async fn rejects_zero_amount_and_unknown_feature() {
    let h = harness();

    let err = h.engine.consume(USER, &FeatureKey::scan(), 0).await.unwrap_err();
    assert!(matches!(err, QuotaError::InvalidAmount));

    let err = h
        .engine
        .consume(USER, &FeatureKey::new("export-action"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, QuotaError::UnknownFeature { tier, .. } if tier == "base"));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unresolvable_tiers_fall_back_to_base() {
    let h = harness();
    let generation = FeatureKey::generation();

    // No profile at all.
    let first = h.engine.consume("stranger", &generation, 1).await.unwrap();
    assert_eq!(first.remaining(), Some(0));
    let second = h.engine.consume("stranger", &generation, 1).await.unwrap();
    assert_eq!(second.deny_reason(), Some(DenyReason::LimitExceeded));

    // A tier the policy table does not know.
    h.profiles.assign("legacy", "platinum");
    let status = h.engine.status("legacy").await.unwrap();
    assert_eq!(status.tier, "base");
}

#[tokio::test]
async fn profile_outage_applies_fallback_tier() {
    struct DownProfiles;

    #[async_trait]
    impl ProfileSource for DownProfiles {
        async fn tier_of(&self, _user_id: &str) -> Result<Option<String>, ProfileError> {
            Err(ProfileError::Unavailable("connection refused".to_string()))
        }
    }

    let observer = Arc::new(RecordingObserver::default());
    let engine = QuotaEngine::builder(
        Arc::new(InMemoryQuotaStore::new()),
        Arc::new(DownProfiles),
        policies(),
    )
    .observer(observer.clone())
    .build();

    let decision = engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();
    assert_eq!(decision.remaining(), Some(2));
    assert_eq!(observer.events(), vec!["fallback:base"]);
}

#[tokio::test]
async fn tier_change_applies_new_limit_to_existing_record() {
    let h = harness();
    seed(&h.store, h.clock.now(), 3).await;

    h.profiles.assign(USER, "pro");
    let decision = h.engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();

    assert_eq!(decision.remaining(), Some(6));
    let record = h.store.load(&scan_key()).await.unwrap().unwrap();
    assert_eq!(record.limit_value, 10);
    assert_eq!(record.current_usage, 4);
}

#[tokio::test]
async fn cached_tier_outlives_profile_change_until_expiry() {
    let store = Arc::new(InMemoryQuotaStore::new());
    let profiles = Arc::new(StaticProfileDirectory::new());
    profiles.assign(USER, TierPolicyTable::UNLIMITED);
    let cache = Arc::new(InMemoryTierCache::new());
    let engine = QuotaEngine::builder(store.clone(), profiles.clone(), policies())
        .tier_cache(cache.clone(), Duration::from_secs(30))
        .build();

    assert_eq!(engine.status(USER).await.unwrap().tier, "unlimited");
    profiles.assign(USER, TierPolicyTable::BASE);
    assert_eq!(engine.status(USER).await.unwrap().tier, "unlimited");

    cache.invalidate(USER).await.unwrap();
    assert_eq!(engine.status(USER).await.unwrap().tier, "base");
}

#[tokio::test]
async fn status_reports_without_writing() {
    let h = harness();
    let now = h.clock.now();
    let mut record = seed(&h.store, now - TimeDelta::hours(25), 3).await;
    record.is_blocked = true;
    record.blocked_until = Some(now - TimeDelta::minutes(1));
    record.revision = 1;
    assert!(h.store.compare_and_swap(0, &record).await.unwrap());

    let status = h.engine.status(USER).await.unwrap();

    assert_eq!(status.tier, "base");
    let scan = status.feature(&FeatureKey::scan()).unwrap();
    assert_eq!(scan.used, 0);
    assert_eq!(scan.remaining, Some(3));
    assert_eq!(scan.reset_at, Some(now + TimeDelta::hours(24)));
    assert_eq!(scan.blocked_until, None);

    let generation = status.feature(&FeatureKey::generation()).unwrap();
    assert_eq!(generation.used, 0);
    assert_eq!(generation.limit, Some(1));

    // The stored record is unchanged and nothing was provisioned.
    assert_eq!(h.store.load(&scan_key()).await.unwrap(), Some(record));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn status_shows_active_block_past_window_end() {
    let h = harness();
    let now = h.clock.now();
    let mut record = seed(&h.store, now - TimeDelta::hours(25), 3).await;
    record.is_blocked = true;
    record.blocked_until = Some(now + TimeDelta::hours(1));
    record.revision = 1;
    assert!(h.store.compare_and_swap(0, &record).await.unwrap());

    let status = h.engine.status(USER).await.unwrap();
    let scan = status.feature(&FeatureKey::scan()).unwrap();
    assert_eq!(scan.used, 3);
    assert_eq!(scan.remaining, Some(0));
    assert_eq!(scan.blocked_until, Some(now + TimeDelta::hours(1)));

    let decision = h.engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap();
    assert_eq!(decision.deny_reason(), Some(DenyReason::Blocked));
}

#[tokio::test]
async fn escalation_blocks_repeat_offenders() {
    struct BlockOnSecondViolation;

    impl EscalationPolicy for BlockOnSecondViolation {
        fn on_violation(
            &self,
            record: &QuotaRecord,
            now: DateTime<Utc>,
        ) -> Option<DateTime<Utc>> {
            (record.violation_count >= 2).then(|| now + TimeDelta::minutes(15))
        }
    }

    let store = Arc::new(InMemoryQuotaStore::new());
    let profiles = Arc::new(StaticProfileDirectory::new());
    let clock = ManualClock::default();
    let observer = Arc::new(RecordingObserver::default());
    let engine = QuotaEngine::builder(store.clone(), profiles, policies())
        .clock(Arc::new(clock.clone()))
        .escalation(Arc::new(BlockOnSecondViolation))
        .observer(observer.clone())
        .build();
    let generation = FeatureKey::generation();

    assert!(engine.consume(USER, &generation, 1).await.unwrap().is_allowed());
    for _ in 0..2 {
        let denied = engine.consume(USER, &generation, 1).await.unwrap();
        assert_eq!(denied.deny_reason(), Some(DenyReason::LimitExceeded));
    }

    let blocked = engine.consume(USER, &generation, 1).await.unwrap();
    assert_eq!(blocked.deny_reason(), Some(DenyReason::Blocked));
    assert_eq!(
        observer.events(),
        vec![
            "fallback:base",
            "fallback:base",
            "violation:1:open",
            "fallback:base",
            "violation:2:blocked",
            "fallback:base",
        ]
    );

    clock.advance(TimeDelta::minutes(15));
    let status = engine.status(USER).await.unwrap();
    assert_eq!(status.feature(&generation).unwrap().blocked_until, None);
}

#[tokio::test]
async fn store_outage_is_not_a_denial() {
    struct DownStore;

    #[async_trait]
    impl QuotaStore for DownStore {
        async fn load(&self, _key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError> {
            Err(StoreError::Connection("connection reset".to_string()))
        }

        async fn insert_if_absent(&self, _record: QuotaRecord) -> Result<QuotaRecord, StoreError> {
            Err(StoreError::Connection("connection reset".to_string()))
        }

        async fn compare_and_swap(
            &self,
            _expected_revision: u64,
            _next: &QuotaRecord,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Connection("connection reset".to_string()))
        }

        fn backend(&self) -> &'static str {
            "down"
        }
    }

    let profiles = Arc::new(StaticProfileDirectory::new());
    profiles.assign(USER, TierPolicyTable::BASE);
    let observer = Arc::new(RecordingObserver::default());
    let engine = QuotaEngine::builder(Arc::new(DownStore), profiles, policies())
        .observer(observer.clone())
        .build();

    let err = engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap_err();
    assert!(matches!(err, QuotaError::StoreUnavailable(_)));
    assert_eq!(observer.events(), vec!["failed:user-1:scan-action"]);

    let err = engine.status(USER).await.unwrap_err();
    assert!(matches!(err, QuotaError::StoreUnavailable(_)));

    // Unlimited users are never gated on the store.
    let engine = QuotaEngine::builder(
        Arc::new(DownStore),
        Arc::new(
            [(USER, TierPolicyTable::UNLIMITED)]
                .into_iter()
                .collect::<StaticProfileDirectory>(),
        ),
        policies(),
    )
    .build();
    assert!(engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap().is_allowed());
}

#[tokio::test]
async fn exhausted_retries_surface_as_store_unavailable() {
    /// Store where every compare-and-swap loses.
    struct ContendedStore(InMemoryQuotaStore);

    #[async_trait]
    impl QuotaStore for ContendedStore {
        async fn load(&self, key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError> {
            self.0.load(key).await
        }

        async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord, StoreError> {
            self.0.insert_if_absent(record).await
        }

        async fn compare_and_swap(
            &self,
            _expected_revision: u64,
            _next: &QuotaRecord,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn backend(&self) -> &'static str {
            "contended"
        }
    }

    let profiles = Arc::new(StaticProfileDirectory::new());
    let engine = QuotaEngine::builder(
        Arc::new(ContendedStore(InMemoryQuotaStore::new())),
        profiles,
        policies(),
    )
    .config(LimiterConfig { max_cas_attempts: 3 })
    .build();

    let err = engine.consume(USER, &FeatureKey::scan(), 1).await.unwrap_err();
    match err {
        QuotaError::StoreUnavailable(reason) => assert!(reason.contains("3 attempts")),
        other => panic!("expected store unavailable, got {other:?}"),
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl QuotaObserver for RecordingObserver {
    fn profile_fallback(&self, _user_id: &str, fallback_tier: &str, _cause: &FallbackCause) {
        self.push(format!("fallback:{fallback_tier}"));
    }

    fn violation_recorded(&self, record: &QuotaRecord) {
        let state = if record.is_blocked { "blocked" } else { "open" };
        self.push(format!("violation:{}:{state}", record.violation_count));
    }

    fn consume_failed(&self, key: &QuotaKey, _error: &QuotaError) {
        self.push(format!("failed:{key}"));
    }
}
