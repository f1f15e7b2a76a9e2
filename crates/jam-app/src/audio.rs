//! Microphone and playback state.

use jam_core::{Component, ComponentError, Scope, Services};
use serde::{Deserialize, Serialize};

use crate::{
    actions::{RETRY_AUDIO, RETRY_MIC},
    swarm::{Swarm, SwarmCommand},
};

/// Local microphone state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MicState {
    /// Not on stage; the microphone is not used.
    #[default]
    Off,
    /// On stage, waiting for microphone access.
    Requested,
    /// Access granted, muted.
    Muted,
    /// Sending.
    Live,
}

/// Props of [`AudioState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioStateProps {
    /// We are in the room.
    pub in_room: bool,
    /// We are on stage.
    pub i_am_speaker: bool,
    /// The user muted the microphone.
    pub mic_muted: bool,
    /// The user interacted with the page, so playback may start.
    pub user_interacted: bool,
}

/// Output of [`AudioState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioView {
    /// Microphone state.
    pub mic: MicState,
    /// Remote audio cannot play until the user interacts.
    pub sound_blocked: bool,
    /// `RETRY_MIC` actions handled so far.
    pub mic_retries: u32,
    /// `RETRY_AUDIO` actions handled so far.
    pub audio_retries: u32,
}

/// Microphone and playback state.
pub struct AudioState {
    swarm: Swarm,
    requested: bool,
    mic_retries: u32,
    audio_retries: u32,
}

impl Component for AudioState {
    type Props = AudioStateProps;
    type Output = AudioView;

    fn mount(_: &AudioStateProps, services: &Services) -> Result<Self, ComponentError> {
        let swarm = (*services.require::<Swarm>()?).clone();
        Ok(Self { swarm, requested: false, mic_retries: 0, audio_retries: 0 })
    }

    fn render(
        &mut self,
        props: &AudioStateProps,
        cx: &mut Scope<'_>,
    ) -> Result<AudioView, ComponentError> {
        let on_stage = props.in_room && props.i_am_speaker;

        if cx.use_action(RETRY_MIC).is_some() {
            self.mic_retries += 1;
            if on_stage {
                self.swarm.send(SwarmCommand::RequestMic);
            }
        }
        if cx.use_action(RETRY_AUDIO).is_some() {
            self.audio_retries += 1;
            self.swarm.send(SwarmCommand::ResumeAudio);
        }

        let mic = if on_stage {
            let granted =
                cx.get_as::<bool, _>(self.swarm.status(), &["micGranted"]).unwrap_or(false);
            if !granted && !self.requested {
                self.swarm.send(SwarmCommand::RequestMic);
            }
            self.requested = true;
            match (granted, props.mic_muted) {
                (false, _) => MicState::Requested,
                (true, true) => MicState::Muted,
                (true, false) => MicState::Live,
            }
        } else {
            self.requested = false;
            MicState::Off
        };

        Ok(AudioView {
            mic,
            sound_blocked: props.in_room && !props.user_interacted,
            mic_retries: self.mic_retries,
            audio_retries: self.audio_retries,
        })
    }
}
