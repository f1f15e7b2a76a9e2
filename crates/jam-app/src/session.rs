//! Device-local session state: identities, joined-room history and
//! caller-owned state keys.

use std::{cell::Cell, fmt, rc::Rc};

use jam_core::{LocalStorage, StateStore, stored_state};
use serde_json::{Value, json};

use crate::{
    env::Entropy,
    error::JamError,
    identity::{Identity, IdentityInfo},
};

/// Persisted key of the identity document.
pub const IDENTITIES_KEY: &str = "jam.identities";
/// Persisted key of the joined-room history.
pub const JOINED_ROOMS_KEY: &str = "jam.joinedRooms";
/// Identity slot used when the selected room has no identity of its own.
pub const DEFAULT_IDENTITY: &str = "_default";

/// Handles to the session stores.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Session {
    identities: StateStore,
    joined_rooms: StateStore,
    local: StateStore,
    entropy: Rc<dyn Entropy>,
    configured_auto_join_used: Rc<Cell<bool>>,
}

impl Session {
    /// Open the persisted stores in `storage`.
    pub fn open(storage: Rc<dyn LocalStorage>, entropy: Rc<dyn Entropy>) -> Self {
        Self {
            identities: stored_state(Rc::clone(&storage), IDENTITIES_KEY, json!({})),
            joined_rooms: stored_state(storage, JOINED_ROOMS_KEY, json!({})),
            local: StateStore::new(),
            entropy,
            configured_auto_join_used: Rc::new(Cell::new(false)),
        }
    }

    /// `slot → Identity`, where a slot is a room id or [`DEFAULT_IDENTITY`].
    pub fn identities(&self) -> &StateStore {
        &self.identities
    }

    /// `roomId → true` for rooms this device is in.
    pub fn joined_rooms(&self) -> &StateStore {
        &self.joined_rooms
    }

    /// Keys set by the embedding application, merged into every snapshot.
    pub fn local(&self) -> &StateStore {
        &self.local
    }

    /// The default identity, generated and persisted on first use.
    pub fn ensure_default_identity(&self) -> Identity {
        if let Some(identity) = self.identities.get_as::<Identity, _>(&[DEFAULT_IDENTITY]) {
            return identity;
        }
        let identity = Identity { id: self.entropy.random_id(), info: IdentityInfo::default() };
        tracing::info!(id = %identity.id, "generated identity");
        self.identities.set(&[DEFAULT_IDENTITY], json!(identity));
        identity
    }

    /// Slot of the identity in effect while `room_id` is selected.
    pub fn active_slot<'a>(&self, room_id: Option<&'a str>) -> &'a str {
        match room_id {
            Some(room_id) if self.identities.get(&[room_id]).is_some() => room_id,
            _ => DEFAULT_IDENTITY,
        }
    }

    /// Identity stored in `slot`.
    pub fn identity(&self, slot: &str) -> Option<Identity> {
        self.identities.get_as(&[slot])
    }

    /// Use `identity` whenever `room_id` is selected.
    pub fn import_room_identity(&self, room_id: &str, identity: &Identity) -> Result<(), JamError> {
        if room_id.is_empty() || room_id == DEFAULT_IDENTITY {
            return Err(JamError::validation(format!("invalid room id {room_id:?}")));
        }
        if identity.id.is_empty() {
            return Err(JamError::validation("identity id is empty"));
        }
        self.identities.set(&[room_id], json!(identity));
        Ok(())
    }

    /// Replace the metadata of the identity in `slot`.
    pub fn set_info(&self, slot: &str, info: &IdentityInfo) -> bool {
        self.identities.set(&[slot, "info"], json!(info))
    }

    /// Claim the configured one-shot auto-join. Only the first call in a
    /// session returns `true`.
    pub fn take_configured_auto_join(&self) -> bool {
        !self.configured_auto_join_used.replace(true)
    }

    /// Set a caller-owned state key.
    pub fn set_local(&self, key: &str, value: Value) -> bool {
        self.local.set(&[key], value)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identities", &self.identities)
            .field("joined_rooms", &self.joined_rooms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jam_core::MemoryStorage;

    use super::*;
    use crate::env::SeededEntropy;

    fn session(storage: &Rc<MemoryStorage>) -> Session {
        Session::open(storage.clone(), Rc::new(SeededEntropy::new(1)))
    }

    #[test]
    fn default_identity_is_generated_once_and_persisted() {
        let storage = Rc::new(MemoryStorage::new());
        let first = session(&storage).ensure_default_identity();

        let reopened = Session::open(storage.clone(), Rc::new(SeededEntropy::new(2)));
        assert_eq!(reopened.ensure_default_identity(), first);
        assert!(storage.load(IDENTITIES_KEY).unwrap().contains(&first.id));
    }

    #[test]
    fn room_identity_takes_precedence_for_its_room() {
        let storage = Rc::new(MemoryStorage::new());
        let session = session(&storage);
        session.ensure_default_identity();

        let guest = Identity { id: "guest".into(), info: IdentityInfo::default() };
        session.import_room_identity("lobby", &guest).unwrap();

        assert_eq!(session.active_slot(Some("lobby")), "lobby");
        assert_eq!(session.active_slot(Some("studio")), DEFAULT_IDENTITY);
        assert_eq!(session.active_slot(None), DEFAULT_IDENTITY);
        assert!(session.import_room_identity(DEFAULT_IDENTITY, &guest).is_err());
    }

    #[test]
    fn configured_auto_join_is_claimed_once_across_handles() {
        let session = session(&Rc::new(MemoryStorage::new()));
        let handle = session.clone();

        assert!(handle.take_configured_auto_join());
        assert!(!session.take_configured_auto_join());
        assert!(!handle.take_configured_auto_join());
    }
}
