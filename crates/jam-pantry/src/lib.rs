//! Jam Pantry
//!
//! Operator commands against the backing store: namespace counts, and
//! reading or writing single keys.

use std::io::Write;

use jam_store::{KvStore, StoreError};
use serde_json::Value;
use thiserror::Error;

/// Errors of a pantry command.
#[derive(Debug, Error)]
pub enum PantryError {
    /// The value given to `set` is not JSON.
    #[error("invalid JSON value: {reason}")]
    InvalidValue {
        /// Parser message.
        reason: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Writing the output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// A single pantry command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Count rooms and identities.
    Stats,
    /// Print the value under a key.
    Get {
        /// Key to read.
        key: String,
    },
    /// Store a JSON value under a key.
    Set {
        /// Key to write.
        key: String,
        /// Value as JSON text.
        value: String,
    },
}

/// Run `command` against `store`, writing the result to `out`.
pub async fn execute(
    store: &dyn KvStore,
    command: Command,
    out: &mut impl Write,
) -> Result<(), PantryError> {
    match command {
        Command::Stats => {
            let rooms = store.room_count().await?;
            let identities = store.identity_count().await?;
            writeln!(out, "rooms: {rooms}")?;
            writeln!(out, "identities: {identities}")?;
        },
        Command::Get { key } => {
            let value = store.get(&key).await?.unwrap_or(Value::Null);
            writeln!(out, "{value}")?;
        },
        Command::Set { key, value } => {
            let value: Value = serde_json::from_str(&value)
                .map_err(|e| PantryError::InvalidValue { reason: e.to_string() })?;
            store.set(&key, &value).await?;
            tracing::info!(key = %key, "value stored");
            writeln!(out, "ok")?;
        },
    }
    Ok(())
}
