//! The root component and the snapshot it publishes.

use jam_core::{Component, ComponentError, Scope, Services, merge, path};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    admission::{AdmissionProps, InRoom},
    audio::{AudioState, AudioStateProps, MicState},
    config::{AppProps, StaticConfig},
    connection::{AudioProps, ConnectAudio, ConnectProps, ConnectRoom},
    identity::{ActiveIdentity, Identity},
    reactions::Reactions,
    room::{Room, RoomProps, RoomState},
    session::Session,
    swarm::{ConnectionState, Swarm},
};

/// Everything the embedding application sees, as of one completed flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    /// Selected room.
    pub room_id: Option<String>,
    /// Our peer id.
    pub my_id: Option<String>,
    /// Our identity.
    pub my_identity: Option<Identity>,
    /// The selected room, once loaded.
    pub room: Option<Room>,
    /// Whether the selected room loaded.
    pub has_room: bool,
    /// Room we are in.
    pub in_room: Option<String>,
    /// Speaker and on stage.
    pub i_am_speaker: bool,
    /// Moderator of the selected room.
    pub i_am_moderator: bool,
    /// We stepped down from the stage.
    pub left_stage: bool,
    /// Remote peers present in the room.
    pub peers: Vec<String>,
    /// Swarm connection.
    pub connection: ConnectionState,
    /// Speakers whose audio we receive.
    pub remote_speakers: Vec<String>,
    /// We send our audio.
    pub sending_audio: bool,
    /// Microphone state.
    pub mic: MicState,
    /// The user muted the microphone.
    pub mic_muted: bool,
    /// Remote audio waits for user interaction.
    pub sound_blocked: bool,
    /// Microphone retries so far.
    pub mic_retries: u32,
    /// Playback retries so far.
    pub audio_retries: u32,
    /// Keys set with [`Jam::set_state`](crate::Jam::set_state).
    #[serde(skip)]
    pub extra: Map<String, Value>,
}

impl AppSnapshot {
    /// The snapshot as one JSON object. Computed fields win over
    /// [`extra`](Self::extra) keys of the same name.
    pub fn to_value(&self) -> Value {
        let computed = match serde_json::to_value(self) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("failed to encode snapshot: {}", e);
                Value::Null
            },
        };
        merge([Value::Object(self.extra.clone()), computed])
    }
}

/// Root component: identity, room, admission, connections and audio.
pub struct AppState {
    swarm: Swarm,
    session: Session,
    config: StaticConfig,
}

impl Component for AppState {
    type Props = AppProps;
    type Output = AppSnapshot;

    fn mount(_: &AppProps, services: &Services) -> Result<Self, ComponentError> {
        Ok(Self {
            swarm: (*services.require::<Swarm>()?).clone(),
            session: (*services.require::<Session>()?).clone(),
            config: (*services.require::<StaticConfig>()?).clone(),
        })
    }

    fn render(
        &mut self,
        props: &AppProps,
        cx: &mut Scope<'_>,
    ) -> Result<AppSnapshot, ComponentError> {
        let room_id = props.room_id.clone();

        let identity = cx.use_component::<ActiveIdentity>(room_id.clone());
        let my_id = identity.my_id.clone();

        let room_props = RoomProps { room_id: room_id.clone(), my_id: my_id.clone() };
        let room = cx.use_component::<RoomState>(room_props);

        // One admission instance per selected room.
        let admission_key = room_id.clone().unwrap_or_default();
        let in_room = cx.use_keyed::<InRoom>(admission_key, AdmissionProps {
            room_id: room_id.clone(),
            auto_join: props.auto_join,
            auto_rejoin: props.auto_rejoin,
            has_room: room.has_room,
            closed: room.closed,
            i_am_moderator: room.i_am_moderator,
        });

        let connection = cx.use_component::<ConnectRoom>(ConnectProps {
            room_id: room_id.clone(),
            my_id: my_id.clone(),
            should_connect: room.has_room,
        });

        let streams = cx.use_component::<ConnectAudio>(AudioProps {
            in_room: in_room.is_some(),
            i_am_speaker: room.i_am_speaker,
            speakers: room.room.as_ref().map(|room| room.speakers.clone()).unwrap_or_default(),
            via_sfu: self.config.sfu,
        });

        self.swarm.my_peer_state().set_many([
            (path(&["micMuted"]), json!(props.mic_muted)),
            (path(&["inRoom"]), json!(in_room.is_some())),
        ]);

        let audio = cx.use_component::<AudioState>(AudioStateProps {
            in_room: in_room.is_some(),
            i_am_speaker: room.i_am_speaker,
            mic_muted: props.mic_muted,
            user_interacted: props.user_interacted,
        });

        cx.declare::<Reactions>(in_room.clone());

        let everything: &[&str] = &[];
        let extra = match cx.get(self.session.local(), everything) {
            Some(Value::Object(extra)) => extra,
            _ => Map::new(),
        };

        Ok(AppSnapshot {
            room_id,
            my_id,
            my_identity: identity.my_identity,
            room: room.room,
            has_room: room.has_room,
            in_room,
            i_am_speaker: room.i_am_speaker,
            i_am_moderator: room.i_am_moderator,
            left_stage: room.left_stage,
            peers: room.peers,
            connection,
            remote_speakers: streams.remote_speakers,
            sending_audio: streams.sending,
            mic: audio.mic,
            mic_muted: props.mic_muted,
            sound_blocked: audio.sound_blocked,
            mic_retries: audio.mic_retries,
            audio_retries: audio.audio_retries,
            extra,
        })
    }
}
