//! In-memory tier cache - used when Redis is not configured.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use quota_core::ports::{CacheError, TierCache};

struct CacheEntry {
    tier: String,
    expires_at: Instant,
}

/// Per-process TTL cache of tier names.
///
/// Note: Data is lost on process restart.
#[derive(Default)]
pub struct InMemoryTierCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryTierCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TierCache for InMemoryTierCache {
    async fn get(&self, user_id: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(user_id) {
            if now < entry.expires_at {
                return Some(entry.tier.clone());
            }
        }
        // Clean up expired entry
        self.entries
            .remove_if(user_id, |_, entry| now >= entry.expires_at);
        None
    }

    async fn put(&self, user_id: &str, tier: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            user_id.to_string(),
            CacheEntry {
                tier: tier.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> Result<(), CacheError> {
        self.entries.remove(user_id);
        Ok(())
    }
}
