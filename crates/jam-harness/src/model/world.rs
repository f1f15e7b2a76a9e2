//! Model world: admission inputs, the mounted admission and the history.
//!
//! The world is the oracle the real session is checked against. Operations
//! only record inputs; [`ModelWorld::flush`] decides admission the way a
//! flush of the real session would.

use std::collections::BTreeMap;

use super::operation::{Operation, room_name};

/// A loaded room, as far as admission cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelRoom {
    /// The room is closed.
    pub closed: bool,
    /// We are listed as a moderator.
    pub moderator: bool,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservableState {
    /// Room we are in.
    pub in_room: Option<String>,
    /// The selected room had loaded.
    pub has_room: bool,
    /// Joined-room history.
    pub joined: BTreeMap<String, bool>,
}

/// What admission sees for the selected room during one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Inputs {
    room: Option<String>,
    auto_join: bool,
    auto_rejoin: bool,
    has_room: bool,
    closed: bool,
    moderator: bool,
}

/// Admission state for one selected room; replaced when the selection changes.
#[derive(Debug, Clone, Default)]
struct Mounted {
    room: Option<String>,
    last: Option<Inputs>,
    in_room: Option<String>,
    auto_join_pending: bool,
}

/// Model world: the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    selected: Option<String>,
    auto_join: bool,
    auto_rejoin: bool,
    rooms: BTreeMap<String, ModelRoom>,
    join: Option<Option<String>>,
    auto_join_requested: bool,
    mounted: Option<Mounted>,
    configured_auto_join_used: bool,
    joined: BTreeMap<String, bool>,
    observed: ObservableState,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// A fresh session with no room selected and auto-rejoin on, flushed once.
    pub fn new() -> Self {
        let mut world = Self {
            selected: None,
            auto_join: false,
            auto_rejoin: true,
            rooms: BTreeMap::new(),
            join: None,
            auto_join_requested: false,
            mounted: None,
            configured_auto_join_used: false,
            joined: BTreeMap::new(),
            observed: ObservableState::default(),
        };
        world.flush();
        world
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) {
        match *op {
            Operation::Select { room } => self.selected = room.map(room_name),
            Operation::Join { room } => self.join = Some(room.map(room_name)),
            Operation::AutoJoin => self.auto_join_requested = true,
            Operation::SetAutoRejoin { enabled } => self.auto_rejoin = enabled,
            Operation::SetAutoJoin { enabled } => self.auto_join = enabled,
            Operation::LoadRoom { room, closed, moderator } => {
                self.rooms.insert(room_name(room), ModelRoom { closed, moderator });
            },
            Operation::Reload { room } => {
                self.rooms.remove(&room_name(room));
            },
            Operation::Flush => self.flush(),
        }
    }

    /// State as of the last flush.
    pub fn observable_state(&self) -> ObservableState {
        self.observed.clone()
    }

    fn inputs(&self) -> Inputs {
        let room = self.selected.as_ref().and_then(|id| self.rooms.get(id));
        Inputs {
            room: self.selected.clone(),
            auto_join: self.auto_join,
            auto_rejoin: self.auto_rejoin,
            has_room: room.is_some(),
            closed: room.is_some_and(|room| room.closed),
            moderator: room.is_some_and(|room| room.moderator),
        }
    }

    /// Evaluate admission with the recorded inputs.
    ///
    /// Admission only re-evaluates when it is new, its inputs changed or an
    /// action addressed it; otherwise the previous outcome stands.
    fn flush(&mut self) {
        let inputs = self.inputs();
        let join = self.join.take();
        let auto_join_requested = std::mem::take(&mut self.auto_join_requested);

        let mut mounted = match self.mounted.take() {
            Some(mounted) if mounted.room == inputs.room => mounted,
            _ => Mounted { room: inputs.room.clone(), ..Mounted::default() },
        };

        let signalled = join.is_some() || auto_join_requested;
        if signalled || mounted.last.as_ref() != Some(&inputs) {
            self.decide(&mut mounted, &inputs, join, auto_join_requested);
            mounted.last = Some(inputs.clone());
        }

        self.observed = ObservableState {
            in_room: mounted.in_room.clone(),
            has_room: inputs.has_room,
            joined: self.joined.clone(),
        };
        self.mounted = Some(mounted);
    }

    fn decide(
        &mut self,
        mounted: &mut Mounted,
        inputs: &Inputs,
        join: Option<Option<String>>,
        auto_join_requested: bool,
    ) {
        // The configured flag is spent once per session, on a selected room.
        if inputs.auto_join && inputs.room.is_some() && !self.configured_auto_join_used {
            self.configured_auto_join_used = true;
            mounted.auto_join_pending = true;
        }
        if auto_join_requested {
            mounted.auto_join_pending = true;
        }

        let previously_joined =
            inputs.room.as_ref().and_then(|room| self.joined.get(room)).copied().unwrap_or(false);
        let allowed = inputs.room.is_some() && (!inputs.closed || inputs.moderator);
        let decided = join.is_some();

        if !allowed {
            mounted.in_room = None;
        } else if let Some(target) = join {
            mounted.in_room = target;
        } else if inputs.auto_rejoin && inputs.has_room && previously_joined {
            mounted.in_room.clone_from(&inputs.room);
            mounted.auto_join_pending = false;
        } else if mounted.auto_join_pending && inputs.has_room {
            mounted.in_room.clone_from(&inputs.room);
            mounted.auto_join_pending = false;
        }

        if !(inputs.auto_rejoin && (inputs.has_room || decided)) {
            return;
        }
        if let Some(room) = &inputs.room {
            if mounted.in_room.is_some() {
                self.joined.insert(room.clone(), true);
            } else {
                self.joined.remove(room);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ops: &[Operation]) -> ObservableState {
        let mut world = ModelWorld::new();
        for op in ops {
            world.apply(op);
        }
        world.observable_state()
    }

    #[test]
    fn nothing_changes_before_a_flush() {
        let state = run(&[Operation::Select { room: Some(0) }, Operation::Join { room: Some(0) }]);
        assert_eq!(state, ObservableState::default());
    }

    #[test]
    fn joining_records_history() {
        let state = run(&[
            Operation::Select { room: Some(0) },
            Operation::LoadRoom { room: 0, closed: false, moderator: false },
            Operation::Join { room: Some(0) },
            Operation::Flush,
        ]);
        assert_eq!(state.in_room.as_deref(), Some("r0"));
        assert_eq!(state.joined.get("r0"), Some(&true));
    }

    #[test]
    fn reselecting_a_joined_room_rejoins_once_loaded() {
        let state = run(&[
            Operation::Select { room: Some(1) },
            Operation::LoadRoom { room: 1, closed: false, moderator: false },
            Operation::Join { room: Some(1) },
            Operation::Flush,
            Operation::Select { room: None },
            Operation::Reload { room: 1 },
            Operation::Flush,
            Operation::Select { room: Some(1) },
            Operation::Flush,
        ]);
        assert_eq!(state.in_room, None);
        assert_eq!(state.joined.get("r1"), Some(&true));

        let state = run(&[
            Operation::Select { room: Some(1) },
            Operation::LoadRoom { room: 1, closed: false, moderator: false },
            Operation::Join { room: Some(1) },
            Operation::Flush,
            Operation::Select { room: None },
            Operation::Flush,
            Operation::Select { room: Some(1) },
            Operation::Flush,
        ]);
        assert_eq!(state.in_room.as_deref(), Some("r1"));
    }

    #[test]
    fn pending_auto_join_outlives_an_early_leave() {
        let state = run(&[
            Operation::Select { room: Some(0) },
            Operation::AutoJoin,
            Operation::Flush,
            Operation::Join { room: None },
            Operation::Flush,
            Operation::LoadRoom { room: 0, closed: false, moderator: false },
            Operation::Flush,
        ]);
        assert_eq!(state.in_room.as_deref(), Some("r0"));
    }

    #[test]
    fn configured_auto_join_is_spent_once_per_session() {
        let state = run(&[
            Operation::SetAutoJoin { enabled: true },
            Operation::Flush,
            Operation::LoadRoom { room: 0, closed: false, moderator: false },
            Operation::LoadRoom { room: 1, closed: false, moderator: false },
            Operation::SetAutoRejoin { enabled: false },
            Operation::Select { room: Some(0) },
            Operation::Flush,
            Operation::Select { room: Some(1) },
            Operation::Flush,
        ]);
        assert_eq!(state.in_room, None);
    }

    #[test]
    fn pending_auto_join_dies_with_the_selection() {
        let state = run(&[
            Operation::Select { room: Some(2) },
            Operation::AutoJoin,
            Operation::Flush,
            Operation::Select { room: Some(0) },
            Operation::Flush,
            Operation::LoadRoom { room: 0, closed: false, moderator: false },
            Operation::Flush,
        ]);
        assert_eq!(state.in_room, None);
    }
}
