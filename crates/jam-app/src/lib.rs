//! Jam App
//!
//! Live-session state of an audio room client, built on [`jam_core`]: which
//! identity we use, which room is selected and whether we are in it, who may
//! speak or moderate, and what the transport should connect to.
//!
//! # Architecture
//!
//! ```text
//! AppState
//! ├── ActiveIdentity   identity for the selected room
//! ├── RoomState        room document, roles, present peers
//! ├── InRoom           admission state machine (keyed by room)
//! ├── ConnectRoom      swarm connection
//! ├── ConnectAudio     audio routing
//! ├── AudioState       microphone and playback
//! └── Reactions        reaction forwarding
//! ```
//!
//! Collaborators are injected as services: [`Backend`] (KV store and room
//! cache), [`Swarm`] (presence and transport outbox), [`Session`] (persisted
//! identities and joined-room history) and [`StaticConfig`]. [`Jam`] owns the
//! runtime and exposes the public operations.

pub mod actions;
pub mod admission;
pub mod app;
pub mod audio;
pub mod backend;
pub mod config;
pub mod connection;
pub mod env;
pub mod error;
pub mod identity;
mod jam;
pub mod reactions;
pub mod room;
pub mod session;
pub mod swarm;

pub use admission::{Admission, AdmissionInput, AdmissionProps, InRoom, Signals};
pub use app::{AppSnapshot, AppState};
pub use audio::MicState;
pub use backend::Backend;
pub use config::{AppProps, JamConfig, JamOptions, StaticConfig};
pub use env::{Entropy, SeededEntropy, SystemEntropy};
pub use error::JamError;
pub use identity::{Identity, IdentityInfo};
pub use jam::Jam;
pub use room::{PartialRoom, Room};
pub use session::Session;
pub use swarm::{ConnectionState, PeerPresence, Swarm, SwarmCommand};
