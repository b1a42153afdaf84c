//! # Quota Infrastructure
//!
//! Concrete implementations of the ports defined in `quota-core`: quota
//! stores, tier caches and profile sources.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `postgres` - PostgreSQL quota store and profile source via SeaORM
//! - `redis` - Redis quota store and tier cache

pub mod cache;
pub mod database;
pub mod profile;
pub mod store;

// Re-exports - In-Memory
pub use cache::InMemoryTierCache;
pub use profile::StaticProfileDirectory;
pub use store::InMemoryQuotaStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use cache::{RedisConfig, RedisTierCache};
#[cfg(feature = "redis")]
pub use store::{RedisQuotaStore, RedisQuotaStoreConfig};

// Re-exports - Postgres
#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, connect};
#[cfg(feature = "postgres")]
pub use profile::PostgresProfileSource;
#[cfg(feature = "postgres")]
pub use store::PostgresQuotaStore;
