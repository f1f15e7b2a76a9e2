use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use crate::{KvStore, StoreError};

/// Fault-injecting wrapper around another store.
///
/// Each operation fails with [`StoreError::Connection`] with probability
/// `failure_rate`, decided by a seeded RNG so runs are reproducible. Failed
/// operations never reach the inner store.
pub struct ChaoticStore {
    inner: Arc<dyn KvStore>,
    failure_rate: f64,
    rng: Mutex<ChaCha8Rng>,
    injected: AtomicU64,
}

impl ChaoticStore {
    /// Wrap `inner`, failing a `failure_rate` share of operations.
    pub fn new(inner: Arc<dyn KvStore>, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: if failure_rate.is_nan() { 0.0 } else { failure_rate.clamp(0.0, 1.0) },
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            injected: AtomicU64::new(0),
        }
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    fn roll(&self, op: &'static str, key: &str) -> Result<(), StoreError> {
        let mut rng =
            self.rng.lock().map_err(|e| StoreError::Internal { reason: e.to_string() })?;
        if rng.gen_bool(self.failure_rate) {
            self.injected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(op, key, "injecting store failure");
            return Err(StoreError::Connection { reason: format!("injected fault during {op}") });
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for ChaoticStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.roll("get", key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.roll("set", key)?;
        self.inner.set(key, value).await
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        self.roll("keys", prefix)?;
        self.inner.count_by_prefix(prefix).await
    }
}

impl std::fmt::Debug for ChaoticStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaoticStore")
            .field("failure_rate", &self.failure_rate)
            .field("injected", &self.injected_failures())
            .finish_non_exhaustive()
    }
}
