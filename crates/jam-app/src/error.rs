//! Application error types.

use jam_store::StoreError;
use thiserror::Error;

/// Errors returned by room, admin and identity operations.
///
/// These go straight back to the caller; none of them pass through the
/// component graph, and a rejected operation never mutates anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JamError {
    /// The request was malformed.
    #[error("invalid request: {reason}")]
    Validation {
        /// What was wrong with it.
        reason: String,
    },

    /// The caller lacks the role the operation requires.
    #[error("{peer_id} may not {action}")]
    PermissionDenied {
        /// Peer that attempted the operation.
        peer_id: String,
        /// The attempted operation.
        action: String,
    },

    /// The room does not exist.
    #[error("room not found: {room_id}")]
    RoomNotFound {
        /// The missing room.
        room_id: String,
    },

    /// The room exists already.
    #[error("room already exists: {room_id}")]
    RoomAlreadyExists {
        /// The existing room.
        room_id: String,
    },

    /// No identity is available yet.
    #[error("no identity")]
    NoIdentity,

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl JamError {
    /// Returns true if retrying the same operation later may succeed.
    ///
    /// Validation and permission failures are final; store connectivity
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Validation { .. }
            | Self::PermissionDenied { .. }
            | Self::RoomNotFound { .. }
            | Self::RoomAlreadyExists { .. }
            | Self::NoIdentity => false,
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    pub(crate) fn denied(peer_id: &str, action: impl Into<String>) -> Self {
        Self::PermissionDenied { peer_id: peer_id.to_owned(), action: action.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_is_transient() {
        let lost = JamError::from(StoreError::Connection { reason: "reset".into() });
        assert!(lost.is_transient());

        let rejected = JamError::from(StoreError::Command { reason: "WRONGTYPE".into() });
        assert!(!rejected.is_transient());
        assert!(!JamError::validation("speakers missing").is_transient());
        assert!(!JamError::denied("peer", "update room").is_transient());
    }

    #[test]
    fn messages_name_the_subject() {
        assert_eq!(
            JamError::denied("alice", "update room lobby").to_string(),
            "alice may not update room lobby"
        );
        assert_eq!(
            JamError::RoomNotFound { room_id: "lobby".into() }.to_string(),
            "room not found: lobby"
        );
    }
}
