//! Connection declarations: which swarm to join and whose audio to receive.

use std::collections::BTreeMap;

use jam_core::{Component, ComponentError, Scope, Services};

use crate::swarm::{ConnectionState, PeerPresence, Swarm, SwarmCommand};

/// Props of [`ConnectRoom`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectProps {
    /// Selected room.
    pub room_id: Option<String>,
    /// Our peer id.
    pub my_id: Option<String>,
    /// Whether a connection is wanted at all.
    pub should_connect: bool,
}

/// Keeps the transport connected to the selected room's swarm.
///
/// Emits `Connect`/`Disconnect` whenever the wanted `(room, peer)` pair
/// changes, and disconnects on unmount.
pub struct ConnectRoom {
    swarm: Swarm,
    connected: Option<(String, String)>,
}

impl Component for ConnectRoom {
    type Props = ConnectProps;
    type Output = ConnectionState;

    fn mount(_: &ConnectProps, services: &Services) -> Result<Self, ComponentError> {
        let swarm = (*services.require::<Swarm>()?).clone();
        Ok(Self { swarm, connected: None })
    }

    fn render(
        &mut self,
        props: &ConnectProps,
        cx: &mut Scope<'_>,
    ) -> Result<ConnectionState, ComponentError> {
        let wanted = match (&props.room_id, &props.my_id) {
            (Some(room_id), Some(my_id)) if props.should_connect => {
                Some((room_id.clone(), my_id.clone()))
            },
            _ => None,
        };

        if wanted != self.connected {
            if let Some((room_id, _)) = self.connected.take() {
                self.swarm.send(SwarmCommand::Disconnect { room_id });
            }
            if let Some((room_id, peer_id)) = wanted.clone() {
                self.swarm.send(SwarmCommand::Connect { room_id, peer_id });
            }
            self.connected = wanted;
        }

        if self.connected.is_none() {
            return Ok(ConnectionState::Disconnected);
        }
        Ok(cx.get_as(self.swarm.status(), &["connection"]).unwrap_or(ConnectionState::Connecting))
    }

    fn unmount(&mut self) {
        if let Some((room_id, _)) = self.connected.take() {
            self.swarm.send(SwarmCommand::Disconnect { room_id });
        }
    }
}

/// Props of [`ConnectAudio`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioProps {
    /// We are in the room.
    pub in_room: bool,
    /// We are on stage.
    pub i_am_speaker: bool,
    /// The room's speaker list.
    pub speakers: Vec<String>,
    /// Route audio through the forwarding unit.
    pub via_sfu: bool,
}

/// Output of [`ConnectAudio`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioStreams {
    /// Speakers present in the room, whose audio we receive.
    pub remote_speakers: Vec<String>,
    /// Whether we send our own audio.
    pub sending: bool,
}

/// Decides whose audio flows where.
pub struct ConnectAudio {
    swarm: Swarm,
    sending: bool,
    via_sfu: bool,
}

impl Component for ConnectAudio {
    type Props = AudioProps;
    type Output = AudioStreams;

    fn mount(_: &AudioProps, services: &Services) -> Result<Self, ComponentError> {
        let swarm = (*services.require::<Swarm>()?).clone();
        Ok(Self { swarm, sending: false, via_sfu: false })
    }

    fn render(
        &mut self,
        props: &AudioProps,
        cx: &mut Scope<'_>,
    ) -> Result<AudioStreams, ComponentError> {
        let sending = props.in_room && props.i_am_speaker;
        if sending != self.sending {
            self.swarm.send(SwarmCommand::SendAudio { enabled: sending, via_sfu: props.via_sfu });
            self.sending = sending;
            self.via_sfu = props.via_sfu;
        }

        let remote_speakers = if props.in_room {
            let everyone: &[&str] = &[];
            let presence: BTreeMap<String, PeerPresence> =
                cx.get_as(self.swarm.peer_state(), everyone).unwrap_or_default();
            presence
                .into_iter()
                .filter(|(peer_id, presence)| presence.in_room && props.speakers.contains(peer_id))
                .map(|(peer_id, _)| peer_id)
                .collect()
        } else {
            Vec::new()
        };

        Ok(AudioStreams { remote_speakers, sending })
    }

    fn unmount(&mut self) {
        if self.sending {
            self.swarm.send(SwarmCommand::SendAudio { enabled: false, via_sfu: self.via_sfu });
        }
    }
}
