use std::sync::Arc;

use crate::{KvStore, MemoryStore, RedisStore, StoreError};

/// Address used when none is configured.
pub const DEFAULT_REDIS_URL: &str = "redis://pantryredis:6379";

/// Selects the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Keep everything in process instead of talking to Redis.
    pub local: bool,
    /// Redis address, used unless `local` is set.
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { local: false, redis_url: DEFAULT_REDIS_URL.to_owned() }
    }
}

impl StoreConfig {
    /// In-process configuration.
    pub fn local() -> Self {
        Self { local: true, ..Self::default() }
    }

    /// Open the configured store.
    pub async fn open(&self) -> Result<Arc<dyn KvStore>, StoreError> {
        if self.local {
            tracing::info!("using in-process store");
            return Ok(Arc::new(MemoryStore::new()));
        }
        Ok(Arc::new(RedisStore::connect(&self.redis_url).await?))
    }
}
