//! Rooms and the component that loads the selected one.

use std::collections::BTreeMap;

use jam_core::{Component, ComponentError, Scope, Services};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    actions::LEAVE_STAGE,
    backend::Backend,
    swarm::{PeerPresence, Swarm},
};

/// A room document, stored at `rooms/<roomId>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Room {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Closed rooms admit moderators only.
    pub closed: bool,
    /// Peers allowed to moderate.
    pub moderators: Vec<String>,
    /// Peers allowed on stage.
    pub speakers: Vec<String>,
}

impl Room {
    /// Whether `peer_id` moderates this room.
    pub fn is_moderator(&self, peer_id: &str) -> bool {
        self.moderators.iter().any(|id| id == peer_id)
    }

    /// Whether `peer_id` is a speaker of this room.
    pub fn is_speaker(&self, peer_id: &str) -> bool {
        self.speakers.iter().any(|id| id == peer_id)
    }

    /// Overlay the fields set in `partial`.
    #[must_use]
    pub fn merged(mut self, partial: PartialRoom) -> Self {
        let PartialRoom { name, description, closed, moderators, speakers } = partial;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(closed) = closed {
            self.closed = closed;
        }
        if let Some(moderators) = moderators {
            self.moderators = moderators;
        }
        if let Some(speakers) = speakers {
            self.speakers = speakers;
        }
        self
    }
}

/// A room with only some fields specified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialRoom {
    /// See [`Room::name`].
    pub name: Option<String>,
    /// See [`Room::description`].
    pub description: Option<String>,
    /// See [`Room::closed`].
    pub closed: Option<bool>,
    /// See [`Room::moderators`].
    pub moderators: Option<Vec<String>>,
    /// See [`Room::speakers`].
    pub speakers: Option<Vec<String>>,
}

impl From<Room> for PartialRoom {
    fn from(room: Room) -> Self {
        Self {
            name: Some(room.name),
            description: Some(room.description),
            closed: Some(room.closed),
            moderators: Some(room.moderators),
            speakers: Some(room.speakers),
        }
    }
}

/// Props of [`RoomState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomProps {
    /// Selected room.
    pub room_id: Option<String>,
    /// Our peer id.
    pub my_id: Option<String>,
}

/// Output of [`RoomState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomView {
    /// The loaded room.
    pub room: Option<Room>,
    /// Whether the room loaded.
    pub has_room: bool,
    /// Whether the room is closed.
    pub closed: bool,
    /// Speaker of the room and still on stage.
    pub i_am_speaker: bool,
    /// Moderator of the room.
    pub i_am_moderator: bool,
    /// We stepped down from the stage.
    pub left_stage: bool,
    /// Remote peers present in the room, sorted.
    pub peers: Vec<String>,
}

/// Loads the selected room and derives our roles in it.
///
/// A room missing from the read cache is requested from the backend; the
/// driver fetches it between passes. Handles `LEAVE_STAGE`, and clears the
/// stepped-down flag once we are no longer a speaker.
pub struct RoomState {
    backend: Backend,
    swarm: Swarm,
}

impl Component for RoomState {
    type Props = RoomProps;
    type Output = RoomView;

    fn mount(_: &RoomProps, services: &Services) -> Result<Self, ComponentError> {
        let backend = (*services.require::<Backend>()?).clone();
        let swarm = (*services.require::<Swarm>()?).clone();
        Ok(Self { backend, swarm })
    }

    fn render(
        &mut self,
        props: &RoomProps,
        cx: &mut Scope<'_>,
    ) -> Result<RoomView, ComponentError> {
        let Some(room_id) = props.room_id.as_deref() else {
            return Ok(RoomView::default());
        };

        let room = match cx.get(self.backend.cache(), &["rooms", room_id]) {
            None => {
                self.backend.request(room_id);
                None
            },
            Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value::<Room>(value).map_err(|e| {
                ComponentError::InvalidState {
                    path: format!("rooms/{room_id}"),
                    reason: e.to_string(),
                }
            })?),
        };

        let everyone: &[&str] = &[];
        let presence: BTreeMap<String, PeerPresence> =
            cx.get_as(self.swarm.peer_state(), everyone).unwrap_or_default();
        let peers = presence
            .into_iter()
            .filter(|(peer_id, presence)| presence.in_room && Some(peer_id) != props.my_id.as_ref())
            .map(|(peer_id, _)| peer_id)
            .collect();

        let my_id = props.my_id.as_deref();
        let listed = room.as_ref().zip(my_id).is_some_and(|(room, id)| room.is_speaker(id));
        let i_am_moderator =
            room.as_ref().zip(my_id).is_some_and(|(room, id)| room.is_moderator(id));

        let me = self.swarm.my_peer_state();
        let mut left_stage = cx.get_as::<bool, _>(me, &["leftStage"]).unwrap_or(false);
        if cx.use_action(LEAVE_STAGE).is_some() && listed && !left_stage {
            tracing::debug!(room_id, "leaving stage");
            me.set(&["leftStage"], json!(true));
            left_stage = true;
        }
        if room.is_some() && !listed && left_stage {
            me.set(&["leftStage"], json!(false));
            left_stage = false;
        }

        Ok(RoomView {
            has_room: room.is_some(),
            closed: room.as_ref().is_some_and(|room| room.closed),
            i_am_speaker: listed && !left_stage,
            i_am_moderator,
            left_stage,
            peers,
            room,
        })
    }
}
