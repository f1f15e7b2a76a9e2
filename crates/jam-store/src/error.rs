//! Store error types.

use thiserror::Error;

/// Errors from backing store operations.
///
/// A missing key is never an error; reads report it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unreachable: {reason}")]
    Connection {
        /// Description of the connectivity failure.
        reason: String,
    },

    /// The store rejected a command.
    #[error("store command failed: {reason}")]
    Command {
        /// Description of the failure.
        reason: String,
    },

    /// A stored value is not a valid document.
    #[error("malformed value under {key}: {reason}")]
    Codec {
        /// Key whose value failed to decode.
        key: String,
        /// Parser message.
        reason: String,
    },

    /// Internal state was unusable.
    #[error("internal store error: {reason}")]
    Internal {
        /// Description of the failure.
        reason: String,
    },
}

impl StoreError {
    /// Returns true if retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_connection_dropped()
            || error.is_connection_refusal()
            || error.is_io_error()
            || error.is_timeout()
        {
            Self::Connection { reason: error.to_string() }
        } else {
            Self::Command { reason: error.to_string() }
        }
    }
}
