//! Configuration: static runtime settings, initialization options and root
//! props.

use std::{collections::HashMap, fmt, rc::Rc};

use jam_core::LocalStorage;
use serde::{Deserialize, Serialize};

use crate::{env::Entropy, room::Room};

/// Pantry address used when none is configured.
pub const DEFAULT_PANTRY_URL: &str = "http://localhost:3001";

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticConfig {
    /// Development mode: enables tree introspection.
    pub development: bool,
    /// Route audio through the selective forwarding unit.
    pub sfu: bool,
    /// Base URL of the pantry service.
    pub pantry_url: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self { development: false, sfu: false, pantry_url: DEFAULT_PANTRY_URL.to_owned() }
    }
}

impl StaticConfig {
    /// Overlay the fields set in `partial`.
    #[must_use]
    pub fn merged(mut self, partial: JamConfig) -> Self {
        if let Some(development) = partial.development {
            self.development = development;
        }
        if let Some(sfu) = partial.sfu {
            self.sfu = sfu;
        }
        if let Some(pantry_url) = partial.pantry_url {
            self.pantry_url = pantry_url;
        }
        self
    }
}

/// Partial [`StaticConfig`] supplied at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JamConfig {
    /// See [`StaticConfig::development`].
    pub development: Option<bool>,
    /// See [`StaticConfig::sfu`].
    pub sfu: Option<bool>,
    /// See [`StaticConfig::pantry_url`].
    pub pantry_url: Option<String>,
}

/// Initialization options for [`Jam`](crate::Jam).
#[derive(Default)]
pub struct JamOptions {
    /// Static configuration merged over the defaults.
    pub jam_config: Option<JamConfig>,
    /// Rooms placed in the read cache up front, skipping their first fetch.
    pub cached_rooms: HashMap<String, Room>,
    /// Log the component tree after every flush.
    pub debug: bool,
    /// Where persisted local state lives. In memory when unset.
    pub storage: Option<Rc<dyn LocalStorage>>,
    /// Entropy for identity generation. OS entropy when unset.
    pub entropy: Option<Rc<dyn Entropy>>,
    /// Initial root props.
    pub props: AppProps,
}

impl fmt::Debug for JamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JamOptions")
            .field("jam_config", &self.jam_config)
            .field("cached_rooms", &self.cached_rooms.keys().collect::<Vec<_>>())
            .field("debug", &self.debug)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

/// Root props, supplied by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppProps {
    /// Room selected by navigation.
    pub room_id: Option<String>,
    /// Whether the user interacted with the page (audio may autoplay).
    pub user_interacted: bool,
    /// Whether the local microphone is muted.
    pub mic_muted: bool,
    /// Join the selected room once, as soon as it loads.
    pub auto_join: bool,
    /// Re-enter rooms this device was in before.
    pub auto_rejoin: bool,
}

impl Default for AppProps {
    fn default() -> Self {
        Self {
            room_id: None,
            user_interacted: false,
            mic_muted: false,
            auto_join: false,
            auto_rejoin: true,
        }
    }
}
