//! Application state - shared across all handlers.

use std::sync::Arc;

use quota_core::QuotaEngine;
use quota_core::ports::{ProfileSource, QuotaStore, TierCache};
use quota_infra::{InMemoryQuotaStore, InMemoryTierCache};

use crate::config::{AppConfig, ConfigError, StoreBackend};

#[cfg(feature = "postgres")]
use quota_infra::{PostgresProfileSource, PostgresQuotaStore};
#[cfg(feature = "redis")]
use quota_infra::{RedisQuotaStore, RedisTierCache};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QuotaEngine>,
}

impl AppState {
    pub fn from_engine(engine: QuotaEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Build the application state with the configured backends.
    ///
    /// A selected Redis or Postgres store that cannot be reached fails startup.
    /// Only the tier cache and the profile source degrade to in-memory adapters.
    pub async fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let policies = config.load_policies()?;

        #[cfg(feature = "postgres")]
        let db = match &config.database {
            Some(db_config) => match quota_infra::connect(db_config).await {
                Ok(conn) => Some(conn),
                Err(e) if config.store == StoreBackend::Postgres => {
                    return Err(ConfigError::Backend(format!("postgres: {e}")));
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using static profiles.",
                        e
                    );
                    None
                }
            },
            None => None,
        };

        #[cfg(feature = "postgres")]
        let postgres_store = db
            .as_ref()
            .map(|conn| Arc::new(PostgresQuotaStore::new(conn.clone())) as Arc<dyn QuotaStore>);
        #[cfg(not(feature = "postgres"))]
        let postgres_store: Option<Arc<dyn QuotaStore>> = None;

        let (store, tier_cache) = match config.store {
            StoreBackend::Memory => memory_backends(),
            StoreBackend::Redis => redis_backends(config).await?,
            StoreBackend::Postgres => {
                let store = postgres_store.ok_or_else(postgres_missing)?;
                (store, Arc::new(InMemoryTierCache::new()) as Arc<dyn TierCache>)
            }
        };

        #[cfg(feature = "postgres")]
        let profiles: Arc<dyn ProfileSource> = match db {
            Some(conn) => Arc::new(PostgresProfileSource::new(conn)),
            None => Arc::new(config.load_profiles()?),
        };
        #[cfg(not(feature = "postgres"))]
        let profiles: Arc<dyn ProfileSource> = Arc::new(config.load_profiles()?);

        let engine = QuotaEngine::builder(store, profiles, policies)
            .tier_cache(tier_cache, config.tier_cache_ttl)
            .config(config.limiter.clone())
            .build();

        tracing::info!(
            store = engine.store_backend(),
            fallback_tier = engine.policies().fallback_tier(),
            tiers = ?engine.policies().tier_names().collect::<Vec<_>>(),
            "Application state initialized"
        );

        Ok(Self::from_engine(engine))
    }
}

#[cfg(feature = "postgres")]
fn postgres_missing() -> ConfigError {
    ConfigError::Backend("postgres store selected but DATABASE_URL is not set".to_string())
}

#[cfg(not(feature = "postgres"))]
fn postgres_missing() -> ConfigError {
    ConfigError::Backend("built without the postgres feature".to_string())
}

fn memory_backends() -> (Arc<dyn QuotaStore>, Arc<dyn TierCache>) {
    (
        Arc::new(InMemoryQuotaStore::new()),
        Arc::new(InMemoryTierCache::new()),
    )
}

#[cfg(feature = "redis")]
async fn redis_backends(
    config: &AppConfig,
) -> Result<(Arc<dyn QuotaStore>, Arc<dyn TierCache>), ConfigError> {
    let store = RedisQuotaStore::new(config.redis.clone())
        .await
        .map_err(|e| ConfigError::Backend(format!("redis: {e}")))?;

    let cache: Arc<dyn TierCache> =
        match RedisTierCache::new(&config.redis.redis, &config.redis.key_prefix).await {
            Ok(cache) => Arc::new(cache),
            Err(e) if config.redis.redis.fallback_to_memory => {
                tracing::warn!(error = %e, "Redis tier cache unavailable, caching in memory");
                Arc::new(InMemoryTierCache::new())
            }
            Err(e) => return Err(ConfigError::Backend(format!("redis tier cache: {e}"))),
        };

    Ok((Arc::new(store), cache))
}

#[cfg(not(feature = "redis"))]
async fn redis_backends(
    _config: &AppConfig,
) -> Result<(Arc<dyn QuotaStore>, Arc<dyn TierCache>), ConfigError> {
    Err(ConfigError::Backend(
        "built without the redis feature".to_string(),
    ))
}
