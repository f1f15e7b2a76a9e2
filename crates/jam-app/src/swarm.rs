//! Peer presence and the command outbox towards the transport.
//!
//! The signaling and media transport is not part of this crate. It reads the
//! commands components queue here, and writes what it learns (remote peers,
//! connection status, microphone permission) back into the presence stores.

use std::{cell::RefCell, fmt, rc::Rc};

use jam_core::StateStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Presence record of one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeerPresence {
    /// Peer is in the room (not just connected to it).
    pub in_room: bool,
    /// Peer's microphone is muted.
    pub mic_muted: bool,
    /// Peer stepped down from the stage.
    pub left_stage: bool,
}

/// Connection to a room's swarm, as reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// No connection requested, or the connection was closed.
    #[default]
    Disconnected,
    /// Connection requested; the transport has not confirmed it yet.
    Connecting,
    /// Connected to the room's swarm.
    Connected,
}

/// Instruction for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmCommand {
    /// Join the swarm of `room_id` as `peer_id`.
    Connect {
        /// Room to connect to.
        room_id: String,
        /// Our identity in that room.
        peer_id: String,
    },
    /// Leave the swarm of `room_id`.
    Disconnect {
        /// Room to disconnect from.
        room_id: String,
    },
    /// Start or stop sending our microphone.
    SendAudio {
        /// Whether audio is sent at all.
        enabled: bool,
        /// Send through the forwarding unit instead of peer-to-peer.
        via_sfu: bool,
    },
    /// Ask for microphone access.
    RequestMic,
    /// Resume playback of remote audio.
    ResumeAudio,
    /// Broadcast a reaction.
    Reaction {
        /// Reaction as given by the caller.
        payload: Value,
    },
}

/// Shared presence stores plus the outbox.
///
/// Cloning yields another handle to the same swarm.
#[derive(Clone, Default)]
pub struct Swarm {
    peer_state: StateStore,
    my_peer_state: StateStore,
    status: StateStore,
    outbox: Rc<RefCell<Vec<SwarmCommand>>>,
}

impl Swarm {
    /// Empty swarm: no peers, disconnected, microphone not granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// `peerId → PeerPresence` of remote peers.
    pub fn peer_state(&self) -> &StateStore {
        &self.peer_state
    }

    /// Our own [`PeerPresence`], shared with remote peers.
    pub fn my_peer_state(&self) -> &StateStore {
        &self.my_peer_state
    }

    /// Transport status: `connection` and `micGranted`.
    pub fn status(&self) -> &StateStore {
        &self.status
    }

    /// Queue a command for the transport.
    pub fn send(&self, command: SwarmCommand) {
        tracing::debug!(?command, "swarm command");
        self.outbox.borrow_mut().push(command);
    }

    /// Take every queued command, oldest first.
    pub fn drain(&self) -> Vec<SwarmCommand> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    /// Record the presence of a remote peer.
    pub fn set_peer(&self, peer_id: &str, presence: &PeerPresence) {
        self.peer_state.set(&[peer_id], json!(presence));
    }

    /// Forget a remote peer.
    pub fn remove_peer(&self, peer_id: &str) -> bool {
        self.peer_state.remove(&[peer_id])
    }

    /// Record the connection status reported by the transport.
    pub fn set_connection(&self, state: ConnectionState) {
        self.status.set(&["connection"], json!(state));
    }

    /// Record whether microphone access was granted.
    pub fn set_mic_granted(&self, granted: bool) {
        self.status.set(&["micGranted"], json!(granted));
    }

    /// Our own presence record.
    pub fn my_presence(&self) -> PeerPresence {
        serde_json::from_value(self.my_peer_state.snapshot()).unwrap_or_default()
    }
}

impl fmt::Debug for Swarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Swarm")
            .field("peers", &self.peer_state.snapshot())
            .field("me", &self.my_peer_state.snapshot())
            .field("queued", &self.outbox.borrow().len())
            .finish()
    }
}
