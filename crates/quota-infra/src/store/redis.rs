//! Redis quota store: one JSON document per record, written with `SET NX`
//! and a compare-and-swap Lua script.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use quota_core::domain::{QuotaKey, QuotaRecord};
use quota_core::error::StoreError;
use quota_core::ports::QuotaStore;

use crate::cache::RedisConfig;

/// Redis quota store configuration.
#[derive(Debug, Clone)]
pub struct RedisQuotaStoreConfig {
    /// Redis connection config
    pub redis: RedisConfig,
    /// Key prefix for quota records
    pub key_prefix: String,
}

impl Default for RedisQuotaStoreConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: "quota".to_string(),
        }
    }
}

impl RedisQuotaStoreConfig {
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            key_prefix: std::env::var("QUOTA_REDIS_KEY_PREFIX")
                .unwrap_or_else(|_| "quota".to_string()),
        }
    }
}

/// Redis-backed quota store, shared by every server process.
pub struct RedisQuotaStore {
    conn: ConnectionManager,
    config: RedisQuotaStoreConfig,
    /// Swaps the document only while its stored revision matches.
    /// Returns 1 on success, 0 on a revision mismatch, -1 if the key is gone.
    cas_script: Script,
}

impl RedisQuotaStore {
    pub async fn new(config: RedisQuotaStoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.redis.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let cas_script = Script::new(
            r#"
            local current = redis.call('GET', KEYS[1])
            if not current then
                return -1
            end

            local record = cjson.decode(current)
            if tonumber(record['revision']) ~= tonumber(ARGV[1]) then
                return 0
            end

            redis.call('SET', KEYS[1], ARGV[2])
            return 1
            "#,
        );

        tracing::info!(url = %config.redis.url, "Connected to Redis quota store");

        Ok(Self {
            conn,
            config,
            cas_script,
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(RedisQuotaStoreConfig::from_env()).await
    }

    fn make_key(&self, key: &QuotaKey) -> String {
        format!(
            "{}:{}:{}",
            self.config.key_prefix, key.user_id, key.feature_key
        )
    }

    fn decode(redis_key: &str, raw: &str) -> Result<QuotaRecord, StoreError> {
        let record: QuotaRecord = serde_json::from_str(raw)
            .map_err(|e| StoreError::Corrupt(format!("{redis_key}: {e}")))?;
        record
            .validate()
            .map_err(|e| StoreError::Corrupt(format!("{redis_key}: {e}")))?;
        Ok(record)
    }

    fn encode(record: &QuotaRecord) -> Result<String, StoreError> {
        serde_json::to_string(record).map_err(|e| StoreError::Query(e.to_string()))
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn load(&self, key: &QuotaKey) -> Result<Option<QuotaRecord>, StoreError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn
            .get(&redis_key)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        raw.map(|raw| Self::decode(&redis_key, &raw)).transpose()
    }

    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord, StoreError> {
        let redis_key = self.make_key(&record.key());
        let payload = Self::encode(&record)?;
        let mut conn = self.conn.clone();

        let inserted: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(&payload)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        if inserted.is_some() {
            return Ok(record);
        }

        // Lost the creation race: hand back whatever the winner stored.
        let existing: Option<String> = conn
            .get(&redis_key)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        match existing {
            Some(raw) => Self::decode(&redis_key, &raw),
            None => Err(StoreError::Query(format!(
                "{redis_key} vanished after a conflicting insert"
            ))),
        }
    }

    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        next: &QuotaRecord,
    ) -> Result<bool, StoreError> {
        let redis_key = self.make_key(&next.key());
        let payload = Self::encode(next)?;
        let mut conn = self.conn.clone();

        let outcome: i64 = self
            .cas_script
            .key(&redis_key)
            .arg(expected_revision)
            .arg(payload)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        if outcome < 0 {
            tracing::warn!(key = %redis_key, "Quota record missing during compare-and-swap");
        }
        Ok(outcome == 1)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
