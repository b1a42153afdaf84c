//! Profile lookups against the `profiles` table.

use async_trait::async_trait;
use sea_orm::{DbConn, EntityTrait};

use quota_core::ports::{ProfileError, ProfileSource};

use crate::database::entity::profile::Entity;

pub struct PostgresProfileSource {
    db: DbConn,
}

impl PostgresProfileSource {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileSource for PostgresProfileSource {
    async fn tier_of(&self, user_id: &str) -> Result<Option<String>, ProfileError> {
        let profile = Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| ProfileError::Unavailable(e.to_string()))?;

        match profile {
            Some(profile) if profile.tier.trim().is_empty() => Err(ProfileError::Malformed(
                format!("profile {user_id} has an empty tier"),
            )),
            Some(profile) => Ok(Some(profile.tier)),
            None => Ok(None),
        }
    }
}
