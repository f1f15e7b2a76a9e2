//! Jam Store
//!
//! The backing key-value store for room and identity documents.
//!
//! # Architecture
//!
//! [`KvStore`] is the seam consumed by the rest of the system. Two
//! implementations behave identically from the caller's point of view:
//!
//! - [`MemoryStore`]: an in-process map, used in local mode and in tests.
//! - [`RedisStore`]: a Redis server reached over the network. Documents are
//!   stored as JSON text.
//!
//! [`ChaoticStore`] wraps either one and injects connection failures for
//! degradation tests.
//!
//! # Invariants
//!
//! - A missing key reads as `Ok(None)`, never as an error.
//! - `set` followed by `get` on the same key returns an equal document.
//! - `count_by_prefix(p)` counts exactly the keys starting with `p`.
//! - Failures are returned to the caller and never retried internally.

mod chaotic;
pub mod codec;
mod config;
mod error;
mod memory;
mod redis_store;

use async_trait::async_trait;
pub use chaotic::ChaoticStore;
pub use config::{DEFAULT_REDIS_URL, StoreConfig};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
use serde_json::Value;

/// Namespace of room documents.
pub const ROOMS_PREFIX: &str = "rooms/";

/// Namespace of identity documents.
pub const IDENTITIES_PREFIX: &str = "identities/";

/// Key of the admin list.
pub const ADMINS_KEY: &str = "admins";

/// Key of the room document for `room_id`.
pub fn room_key(room_id: &str) -> String {
    format!("{ROOMS_PREFIX}{room_id}")
}

/// Key of the identity document for `id`.
pub fn identity_key(id: &str) -> String {
    format!("{IDENTITIES_PREFIX}{id}")
}

/// Key-value store holding JSON documents.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the document under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the document under `key`.
    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Number of keys starting with `prefix`.
    async fn count_by_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Number of stored rooms.
    async fn room_count(&self) -> Result<usize, StoreError> {
        self.count_by_prefix(ROOMS_PREFIX).await
    }

    /// Number of stored identities.
    async fn identity_count(&self) -> Result<usize, StoreError> {
        self.count_by_prefix(IDENTITIES_PREFIX).await
    }
}
