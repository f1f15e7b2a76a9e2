//! Reaction forwarding.

use jam_core::{Component, ComponentError, Scope, Services};

use crate::{
    actions::REACTION,
    swarm::{Swarm, SwarmCommand},
};

/// Forwards `REACTION` payloads to the swarm while we are in a room.
///
/// Props: the room we are in.
pub struct Reactions {
    swarm: Swarm,
}

impl Component for Reactions {
    type Props = Option<String>;
    type Output = ();

    fn mount(_: &Option<String>, services: &Services) -> Result<Self, ComponentError> {
        let swarm = (*services.require::<Swarm>()?).clone();
        Ok(Self { swarm })
    }

    fn render(
        &mut self,
        in_room: &Option<String>,
        cx: &mut Scope<'_>,
    ) -> Result<(), ComponentError> {
        for action in cx.actions(&[REACTION]) {
            if in_room.is_some() {
                self.swarm.send(SwarmCommand::Reaction { payload: action.payload });
            } else {
                tracing::debug!(sequence_id = action.sequence_id, "reaction outside room dropped");
            }
        }
        Ok(())
    }
}
