//! Quota store implementations - in-memory, Redis and PostgreSQL.

mod memory;

pub use memory::InMemoryQuotaStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisQuotaStore, RedisQuotaStoreConfig};

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresQuotaStore;
