//! A real session driven by [`Operation`]s.
//!
//! Rooms never come from the store: [`Operation::LoadRoom`] writes straight
//! into the read cache and reloads are never fetched, so every flush is
//! deterministic.

use std::{collections::HashMap, rc::Rc, sync::Arc};

use jam_app::{Jam, JamOptions, Room, SeededEntropy};
use jam_core::MemoryStorage;
use jam_store::MemoryStore;

use crate::model::{ObservableState, Operation, room_name};

/// Peer listed as moderator of rooms we do not moderate.
const OWNER: &str = "owner";

/// Real session wrapper mirroring [`crate::ModelWorld`]'s interface.
pub struct JamWorld {
    jam: Jam,
    my_id: String,
}

impl JamWorld {
    /// A session with in-memory storage and identities drawn from `seed`.
    pub fn new(seed: u64) -> Self {
        let options = JamOptions {
            storage: Some(Rc::new(MemoryStorage::new())),
            entropy: Some(Rc::new(SeededEntropy::new(seed))),
            ..JamOptions::default()
        };
        let jam = Jam::new(Arc::new(MemoryStore::new()), options);
        let my_id = jam.my_id().unwrap_or_default();
        Self { jam, my_id }
    }

    /// The wrapped session.
    pub fn jam(&self) -> &Jam {
        &self.jam
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) {
        match *op {
            Operation::Select { room } => {
                self.jam.update_props(|props| props.room_id = room.map(room_name));
            },
            Operation::Join { room: Some(room) } => self.jam.enter_room(&room_name(room)),
            Operation::Join { room: None } => self.jam.leave_room(),
            Operation::AutoJoin => self.jam.auto_join_once(),
            Operation::SetAutoRejoin { enabled } => {
                self.jam.update_props(|props| props.auto_rejoin = enabled);
            },
            Operation::SetAutoJoin { enabled } => {
                self.jam.update_props(|props| props.auto_join = enabled);
            },
            Operation::LoadRoom { room, closed, moderator } => {
                let moderator = if moderator { self.my_id.clone() } else { OWNER.to_owned() };
                let moderators = vec![moderator];
                let room_doc = Room {
                    name: room_name(room),
                    closed,
                    speakers: moderators.clone(),
                    moderators,
                    ..Room::default()
                };
                self.jam.backend().cache_rooms(HashMap::from([(room_name(room), room_doc)]));
            },
            Operation::Reload { room } => self.jam.reload_room(&room_name(room)),
            Operation::Flush => {
                self.jam.flush();
            },
        }
    }

    /// State as of the last flush.
    pub fn observable_state(&self) -> ObservableState {
        let state = self.jam.state();
        let joined = serde_json::from_value(self.jam.session().joined_rooms().snapshot())
            .unwrap_or_default();
        ObservableState { in_room: state.in_room.clone(), has_room: state.has_room, joined }
    }
}
