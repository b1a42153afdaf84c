//! Static profile directory, for tests and single-node deployments.

use async_trait::async_trait;
use dashmap::DashMap;

use quota_core::ports::{ProfileError, ProfileSource};

/// User-to-tier assignments held in memory.
#[derive(Debug, Default)]
pub struct StaticProfileDirectory {
    tiers: DashMap<String, String>,
}

impl StaticProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `tier` to `user_id`, replacing any previous assignment.
    pub fn assign(&self, user_id: impl Into<String>, tier: impl Into<String>) {
        self.tiers.insert(user_id.into(), tier.into());
    }

    pub fn remove(&self, user_id: &str) {
        self.tiers.remove(user_id);
    }
}

impl<U: Into<String>, T: Into<String>> FromIterator<(U, T)> for StaticProfileDirectory {
    fn from_iter<I: IntoIterator<Item = (U, T)>>(iter: I) -> Self {
        Self {
            tiers: iter
                .into_iter()
                .map(|(user, tier)| (user.into(), tier.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileSource for StaticProfileDirectory {
    async fn tier_of(&self, user_id: &str) -> Result<Option<String>, ProfileError> {
        Ok(self.tiers.get(user_id).map(|tier| tier.clone()))
    }
}
