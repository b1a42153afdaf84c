//! Application configuration loaded from environment variables.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quota_core::{LimiterConfig, PolicyError, TierPolicyTable};
use quota_infra::StaticProfileDirectory;

#[cfg(feature = "postgres")]
use quota_infra::DatabaseConfig;
#[cfg(feature = "redis")]
use quota_infra::RedisQuotaStoreConfig;

/// Where quota records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
    Postgres,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "redis" => Some(Self::Redis),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Backend named by `QUOTA_STORE`; memory when unset.
    fn from_setting(value: Option<&str>) -> Result<Self, ConfigError> {
        match value {
            None => Ok(Self::Memory),
            Some(value) => {
                Self::parse(value).ok_or_else(|| ConfigError::UnknownStore(value.to_string()))
            }
        }
    }
}

/// Errors raised while turning configuration into runtime objects.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid profile file {path}: {reason}")]
    Profiles { path: PathBuf, reason: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Unknown QUOTA_STORE {0:?}, expected memory, redis or postgres")]
    UnknownStore(String),

    #[error("Quota store unavailable: {0}")]
    Backend(String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    #[cfg(feature = "redis")]
    pub redis: RedisQuotaStoreConfig,
    /// JSON tier policy table; the built-in table when unset.
    pub policy_file: Option<PathBuf>,
    /// Overrides the policy table's fallback tier.
    pub fallback_tier: Option<String>,
    /// JSON object of user id to tier, used when no profile database is set.
    pub profiles_file: Option<PathBuf>,
    pub tier_cache_ttl: Duration,
    pub limiter: LimiterConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = StoreBackend::from_setting(env::var("QUOTA_STORE").ok().as_deref())?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            store,
            #[cfg(feature = "postgres")]
            database: DatabaseConfig::from_env(),
            #[cfg(feature = "redis")]
            redis: RedisQuotaStoreConfig::from_env(),
            policy_file: env::var("QUOTA_POLICY_FILE").ok().map(PathBuf::from),
            fallback_tier: env::var("QUOTA_FALLBACK_TIER").ok(),
            profiles_file: env::var("QUOTA_PROFILES_FILE").ok().map(PathBuf::from),
            tier_cache_ttl: Duration::from_secs(
                env::var("QUOTA_TIER_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            limiter: LimiterConfig::from_env(),
        })
    }

    /// Tier policy table from `policy_file`, or the built-in one.
    pub fn load_policies(&self) -> Result<TierPolicyTable, ConfigError> {
        let table = match &self.policy_file {
            Some(path) => TierPolicyTable::from_json(&read(path)?)?,
            None => TierPolicyTable::builtin(),
        };

        match &self.fallback_tier {
            Some(tier) => Ok(table.with_fallback(tier.as_str())?),
            None => Ok(table),
        }
    }

    /// Static profile directory from `profiles_file`, empty when unset.
    pub fn load_profiles(&self) -> Result<StaticProfileDirectory, ConfigError> {
        let Some(path) = &self.profiles_file else {
            return Ok(StaticProfileDirectory::new());
        };

        let assignments: std::collections::HashMap<String, String> =
            serde_json::from_str(&read(path)?).map_err(|e| ConfigError::Profiles {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(assignments.into_iter().collect())
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
