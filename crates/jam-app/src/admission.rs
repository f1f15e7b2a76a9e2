//! Room admission: whether the local user is in the selected room.
//!
//! [`Admission`] is the state machine; [`InRoom`] runs it once per pass with
//! the pass's signals and keeps the joined-room history in step.
//!
//! # Invariants
//!
//! Rules are evaluated in order, first match wins:
//!
//! 1. No room selected, or the room is closed and we do not moderate it:
//!    not in a room.
//! 2. A `JOIN` fired this pass: adopt its payload (`null` leaves).
//! 3. Auto-rejoin is on, the room loaded and the history says we were in
//!    it: in the room.
//! 4. An auto-join is pending and the room loaded: in the room, and the
//!    auto-join is consumed.
//! 5. Otherwise: unchanged.
//!
//! A pending auto-join survives passes in which the room has not loaded yet,
//! including passes with a `JOIN`. It is consumed by the first pass in which
//! the room is loaded, by rule 3 or rule 4.

use jam_core::{Component, ComponentError, Scope, Services};
use serde_json::{Value, json};

use crate::{
    actions::{AUTO_JOIN, JOIN},
    session::Session,
};

/// Per-pass facts about the selected room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionInput<'a> {
    /// Selected room.
    pub room_id: Option<&'a str>,
    /// The room's data loaded.
    pub has_room: bool,
    /// The room is closed.
    pub closed: bool,
    /// We moderate the room.
    pub i_am_moderator: bool,
    /// One-shot auto-join flag from configuration.
    pub auto_join: bool,
    /// Auto-rejoin policy.
    pub auto_rejoin: bool,
    /// The history says we were in this room.
    pub previously_joined: bool,
}

/// Actions seen in the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    /// Payload of a `JOIN` action: the room to be in, or `None` to leave.
    pub join: Option<Option<String>>,
    /// An `AUTO_JOIN` action fired.
    pub auto_join: bool,
}

/// The admission state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    in_room: Option<String>,
    auto_join_pending: bool,
    configured_auto_join_used: bool,
}

impl Admission {
    /// Not in a room, nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Room we are in.
    pub fn in_room(&self) -> Option<&str> {
        self.in_room.as_deref()
    }

    /// Whether an auto-join waits for its room to load.
    pub fn is_auto_join_pending(&self) -> bool {
        self.auto_join_pending
    }

    /// Advance by one pass.
    pub fn step(&mut self, input: &AdmissionInput<'_>, signals: Signals) -> Option<&str> {
        let configured = input.auto_join && !self.configured_auto_join_used;
        if configured {
            self.configured_auto_join_used = true;
        }
        if signals.auto_join || configured {
            self.auto_join_pending = true;
        }

        let room_id = match input.room_id {
            Some(room_id) if !input.closed || input.i_am_moderator => room_id,
            _ => {
                self.in_room = None;
                return None;
            },
        };

        if let Some(target) = signals.join {
            self.in_room = target;
        } else if input.auto_rejoin && input.has_room && input.previously_joined {
            self.in_room = Some(room_id.to_owned());
            self.auto_join_pending = false;
        } else if self.auto_join_pending && input.has_room {
            self.in_room = Some(room_id.to_owned());
            self.auto_join_pending = false;
        }
        self.in_room.as_deref()
    }
}

/// Props of [`InRoom`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionProps {
    /// Selected room.
    pub room_id: Option<String>,
    /// One-shot auto-join flag from configuration.
    pub auto_join: bool,
    /// Auto-rejoin policy.
    pub auto_rejoin: bool,
    /// The room loaded.
    pub has_room: bool,
    /// The room is closed.
    pub closed: bool,
    /// We moderate the room.
    pub i_am_moderator: bool,
}

/// Runs [`Admission`] and outputs the room we are in.
///
/// The configured auto-join flag is honoured once per session, by the first
/// admission that has a room selected. With auto-rejoin on, writes the
/// outcome for the selected room to the joined-room history on every pass in
/// which the room is loaded or a `JOIN` fired.
pub struct InRoom {
    admission: Admission,
    session: Session,
}

impl Component for InRoom {
    type Props = AdmissionProps;
    type Output = Option<String>;

    fn mount(_: &AdmissionProps, services: &Services) -> Result<Self, ComponentError> {
        let session = (*services.require::<Session>()?).clone();
        Ok(Self { admission: Admission::new(), session })
    }

    fn render(
        &mut self,
        props: &AdmissionProps,
        cx: &mut Scope<'_>,
    ) -> Result<Option<String>, ComponentError> {
        let join = cx.use_action(JOIN).and_then(|payload| match payload {
            Value::Null => Some(None),
            Value::String(room_id) => Some(Some(room_id)),
            other => {
                tracing::warn!(payload = %other, "ignoring JOIN without room id");
                None
            },
        });
        let decided = join.is_some();
        let signals = Signals { join, auto_join: cx.use_action(AUTO_JOIN).is_some() };

        let history = self.session.joined_rooms();
        let room_id = props.room_id.as_deref();
        let previously_joined =
            room_id.and_then(|room_id| history.get_as::<bool, _>(&[room_id])).unwrap_or(false);
        let input = AdmissionInput {
            room_id,
            has_room: props.has_room,
            closed: props.closed,
            i_am_moderator: props.i_am_moderator,
            auto_join: props.auto_join
                && room_id.is_some()
                && self.session.take_configured_auto_join(),
            auto_rejoin: props.auto_rejoin,
            previously_joined,
        };

        let before = self.admission.in_room().map(str::to_owned);
        let in_room = self.admission.step(&input, signals).map(str::to_owned);
        if in_room != before {
            tracing::info!(from = ?before, to = ?in_room, "admission changed");
        }

        // Until the room loads, only an explicit JOIN may overwrite the history.
        let record = props.auto_rejoin && (props.has_room || decided);
        if let (true, Some(room_id)) = (record, room_id) {
            if in_room.is_some() {
                history.set(&[room_id], json!(true));
            } else {
                history.remove(&[room_id]);
            }
        }
        Ok(in_room)
    }
}
