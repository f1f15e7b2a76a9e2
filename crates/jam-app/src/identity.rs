//! Identity documents and the component exposing the active identity.

use jam_core::{Component, ComponentError, Scope, Services};
use serde::{Deserialize, Serialize};

use crate::session::{DEFAULT_IDENTITY, Session};

/// Public metadata of an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityInfo {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A peer identity. The id doubles as the peer id in rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Hex-encoded random id.
    pub id: String,
    /// Public metadata.
    #[serde(default)]
    pub info: IdentityInfo,
}

/// Output of [`ActiveIdentity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityView {
    /// Peer id in effect.
    pub my_id: Option<String>,
    /// Full identity in effect.
    pub my_identity: Option<Identity>,
}

/// Resolves the identity used for the selected room.
///
/// Props: the selected room id.
pub struct ActiveIdentity {
    session: Session,
}

impl Component for ActiveIdentity {
    type Props = Option<String>;
    type Output = IdentityView;

    fn mount(_: &Option<String>, services: &Services) -> Result<Self, ComponentError> {
        let session = (*services.require::<Session>()?).clone();
        session.ensure_default_identity();
        Ok(Self { session })
    }

    fn render(
        &mut self,
        room_id: &Option<String>,
        cx: &mut Scope<'_>,
    ) -> Result<IdentityView, ComponentError> {
        let identities = self.session.identities();
        let room_identity = match room_id {
            Some(room_id) => cx.get_as::<Identity, _>(identities, &[room_id.as_str()]),
            None => None,
        };
        let identity = match room_identity {
            Some(identity) => Some(identity),
            None => cx.get_as::<Identity, _>(identities, &[DEFAULT_IDENTITY]),
        };

        Ok(IdentityView {
            my_id: identity.as_ref().map(|identity| identity.id.clone()),
            my_identity: identity,
        })
    }
}
