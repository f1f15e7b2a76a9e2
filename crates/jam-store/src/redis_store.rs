use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde_json::Value;

use crate::{KvStore, StoreError, codec};

/// Store backed by a Redis server.
///
/// Connection loss is logged and returned to the caller; the connection
/// manager reconnects on the next command, this type never retries.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    url: String,
}

impl RedisStore {
    /// Connect to the server at `url` (`redis://host:port`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| {
            tracing::error!(url, "invalid redis url: {}", e);
            StoreError::from(e)
        })?;
        let connection = ConnectionManager::new(client).await.map_err(|e| {
            tracing::error!(url, "redis connection failed: {}", e);
            StoreError::from(e)
        })?;
        tracing::info!(url, "redis client connected");
        Ok(Self { connection, url: url.to_owned() })
    }

    /// Server address this store talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn failed(&self, op: &'static str, key: &str, error: redis::RedisError) -> StoreError {
        let error = StoreError::from(error);
        tracing::error!(op, key, url = %self.url, transient = error.is_transient(), "{}", error);
        error
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut connection = self.connection.clone();
        let text: Option<String> =
            connection.get(key).await.map_err(|e| self.failed("get", key, e))?;
        text.map(|text| codec::decode(key, &text)).transpose()
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let () = connection
            .set(key, codec::encode(value))
            .await
            .map_err(|e| self.failed("set", key, e))?;
        Ok(())
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut connection = self.connection.clone();
        let keys: Vec<String> = connection
            .keys(codec::prefix_pattern(prefix))
            .await
            .map_err(|e| self.failed("keys", prefix, e))?;
        Ok(keys.len())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish_non_exhaustive()
    }
}
