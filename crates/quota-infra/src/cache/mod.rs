//! Tier cache implementations - Redis and in-memory.

mod memory;

pub use memory::InMemoryTierCache;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisTierCache};
