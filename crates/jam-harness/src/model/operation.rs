//! Operations for model-based testing.
//!
//! Operations are everything an embedding application or the network can do
//! to a session's admission inputs. They are generated by proptest (or decoded
//! from fuzzer bytes) and applied to both the model and a real session.

use arbitrary::Arbitrary;

/// Number of distinct rooms operations refer to.
///
/// Kept small so sequences revisit the same rooms and hit their history.
pub const ROOM_COUNT: u8 = 3;

/// Room id for a model room number.
pub fn room_name(room: u8) -> String {
    format!("r{}", room % ROOM_COUNT)
}

/// Operations that can be applied to a session.
///
/// Nothing but [`Operation::Flush`] evaluates the session; everything else
/// only changes what the next flush sees.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Select a room, or none.
    Select {
        /// Room to select.
        room: Option<u8>,
    },

    /// Dispatch `JOIN` for a room, or to leave.
    Join {
        /// Room to enter; `None` leaves.
        room: Option<u8>,
    },

    /// Dispatch `AUTO_JOIN`.
    AutoJoin,

    /// Change the auto-rejoin policy.
    SetAutoRejoin {
        /// New policy.
        enabled: bool,
    },

    /// Change the configured one-shot auto-join flag.
    SetAutoJoin {
        /// New flag.
        enabled: bool,
    },

    /// A room document arrives in the cache.
    LoadRoom {
        /// Room that loaded.
        room: u8,
        /// The room is closed.
        closed: bool,
        /// We are listed as a moderator.
        moderator: bool,
    },

    /// Drop a room from the cache and ask for it again.
    ///
    /// The fetch never completes, so the room stays unloaded until the next
    /// [`Operation::LoadRoom`].
    Reload {
        /// Room to reload.
        room: u8,
    },

    /// Run one flush.
    Flush,
}
