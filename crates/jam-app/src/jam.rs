//! The public session handle.

use std::{fmt, rc::Rc, sync::Arc};

use jam_core::{ListenerId, LocalStorage, MemoryStorage, Runtime, RuntimeOptions, Services};
use jam_store::KvStore;
use serde_json::{Value, json};

use crate::{
    actions::{AUTO_JOIN, JOIN, LEAVE_STAGE, REACTION, RETRY_AUDIO, RETRY_MIC},
    app::{AppSnapshot, AppState},
    backend::Backend,
    config::{AppProps, JamOptions, StaticConfig},
    env::{Entropy, SystemEntropy},
    error::JamError,
    identity::{Identity, IdentityInfo},
    room::{PartialRoom, Room},
    session::Session,
    swarm::Swarm,
};

/// A live session: the component tree plus the operations around it.
///
/// Action methods only queue work. Call [`flush`](Self::flush) to evaluate
/// synchronously, [`settle`](Self::settle) to also perform pending room
/// fetches, or drive everything with [`run`](Self::run).
pub struct Jam {
    runtime: Runtime<AppState>,
    backend: Backend,
    swarm: Swarm,
    session: Session,
    config: StaticConfig,
}

impl Jam {
    /// Start a session over `kv` and evaluate the tree once.
    pub fn new(kv: Arc<dyn KvStore>, options: JamOptions) -> Self {
        let JamOptions { jam_config, cached_rooms, debug, storage, entropy, props } = options;

        let config = StaticConfig::default().merged(jam_config.unwrap_or_default());
        let storage: Rc<dyn LocalStorage> = match storage {
            Some(storage) => storage,
            None => Rc::new(MemoryStorage::new()),
        };
        let entropy: Rc<dyn Entropy> = match entropy {
            Some(entropy) => entropy,
            None => Rc::new(SystemEntropy),
        };

        let backend = Backend::new(kv);
        backend.cache_rooms(cached_rooms);
        let swarm = Swarm::new();
        let session = Session::open(storage, entropy);

        let services = Services::new()
            .with(backend.clone())
            .with(swarm.clone())
            .with(session.clone())
            .with(config.clone());
        let options =
            RuntimeOptions { debug: debug || config.development, ..RuntimeOptions::default() };
        let mut runtime = Runtime::new(props, services, options);
        runtime.flush();

        tracing::info!(sfu = config.sfu, pantry = %config.pantry_url, "session started");
        Self { runtime, backend, swarm, session, config }
    }

    /// Current snapshot.
    pub fn state(&self) -> Rc<AppSnapshot> {
        self.runtime.state()
    }

    /// Current root props.
    pub fn props(&self) -> &AppProps {
        self.runtime.props()
    }

    /// Effective static configuration.
    pub fn config(&self) -> &StaticConfig {
        &self.config
    }

    /// Presence stores and the transport outbox.
    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    /// Store access and the room cache.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Identities and joined-room history.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replace the root props.
    pub fn set_props(&mut self, props: AppProps) {
        self.runtime.set_props(props);
    }

    /// Modify the root props in place.
    pub fn update_props(&mut self, update: impl FnOnce(&mut AppProps)) {
        self.runtime.update_props(update);
    }

    /// Set a caller-owned key, merged into [`AppSnapshot::extra`].
    pub fn set_state(&self, key: &str, value: Value) {
        self.session.set_local(key, value);
    }

    /// Call `listener` with every new snapshot.
    pub fn on_state(&mut self, listener: impl Fn(&Rc<AppSnapshot>) + 'static) -> ListenerId {
        self.runtime.on_state(listener)
    }

    /// Remove a listener. Returns whether it existed.
    pub fn off_state(&mut self, id: ListenerId) -> bool {
        self.runtime.off_state(id)
    }

    /// Evaluate queued work now. Returns whether the snapshot changed.
    pub fn flush(&mut self) -> bool {
        self.runtime.flush()
    }

    /// Flush and perform room fetches until nothing is left to do.
    pub async fn settle(&mut self) {
        loop {
            self.runtime.flush();
            if !self.backend.has_pending() {
                break;
            }
            self.backend.fetch_pending().await;
        }
    }

    /// Settle whenever work arrives, until [`shutdown`](Self::shutdown).
    pub async fn run(&mut self) {
        while !self.runtime.is_shut_down() {
            self.settle().await;
            self.runtime.wait().await;
        }
    }

    /// Unmount the tree, running every cleanup.
    pub fn shutdown(&mut self) {
        self.runtime.shutdown();
        tracing::info!("session closed");
    }

    /// Indented dump of the component tree.
    pub fn describe(&self) -> String {
        self.runtime.describe()
    }

    /// Enter `room_id`.
    pub fn enter_room(&self, room_id: &str) {
        self.runtime.dispatch(JOIN, json!(room_id));
    }

    /// Leave the current room.
    pub fn leave_room(&self) {
        self.runtime.dispatch(JOIN, Value::Null);
    }

    /// Step down from the stage.
    pub fn leave_stage(&self) {
        self.runtime.dispatch(LEAVE_STAGE, Value::Null);
    }

    /// Broadcast `reaction` to the room.
    pub fn send_reaction(&self, reaction: Value) {
        self.runtime.dispatch(REACTION, reaction);
    }

    /// Ask for microphone access again.
    pub fn retry_mic(&self) {
        self.runtime.dispatch(RETRY_MIC, Value::Null);
    }

    /// Resume remote audio.
    pub fn retry_audio(&self) {
        self.runtime.dispatch(RETRY_AUDIO, Value::Null);
    }

    /// Join the selected room once it has loaded.
    pub fn auto_join_once(&self) {
        self.runtime.dispatch(AUTO_JOIN, Value::Null);
    }

    /// Fetch `room_id` again.
    pub fn reload_room(&self, room_id: &str) {
        self.backend.reload_room(room_id);
    }

    /// Peer id in effect for the selected room.
    pub fn my_id(&self) -> Result<String, JamError> {
        self.active_identity().map(|identity| identity.id)
    }

    fn active_identity(&self) -> Result<Identity, JamError> {
        let slot = self.session.active_slot(self.props().room_id.as_deref());
        self.session.identity(slot).ok_or(JamError::NoIdentity)
    }

    /// Create `room_id`, moderated by us unless `partial` says otherwise.
    pub async fn create_room(&self, room_id: &str, partial: PartialRoom) -> Result<Room, JamError> {
        self.backend.create_room(&self.my_id()?, room_id, partial).await
    }

    /// Replace the settings of a room we moderate.
    pub async fn update_room(&self, room_id: &str, partial: PartialRoom) -> Result<Room, JamError> {
        self.backend.update_room(&self.my_id()?, room_id, partial).await
    }

    /// Invite `peer_id` on stage.
    pub async fn add_speaker(&self, room_id: &str, peer_id: &str) -> Result<(), JamError> {
        self.backend.add_speaker(&self.my_id()?, room_id, peer_id).await
    }

    /// Move `peer_id` off stage.
    pub async fn remove_speaker(&self, room_id: &str, peer_id: &str) -> Result<(), JamError> {
        self.backend.remove_speaker(&self.my_id()?, room_id, peer_id).await
    }

    /// Make `peer_id` a moderator.
    pub async fn add_moderator(&self, room_id: &str, peer_id: &str) -> Result<(), JamError> {
        self.backend.add_moderator(&self.my_id()?, room_id, peer_id).await
    }

    /// Revoke moderation from `peer_id`.
    pub async fn remove_moderator(&self, room_id: &str, peer_id: &str) -> Result<(), JamError> {
        self.backend.remove_moderator(&self.my_id()?, room_id, peer_id).await
    }

    /// Make `peer_id` an admin.
    pub async fn add_admin(&self, peer_id: &str) -> Result<(), JamError> {
        self.backend.add_admin(&self.my_id()?, peer_id).await
    }

    /// Revoke admin rights of `peer_id`.
    pub async fn remove_admin(&self, peer_id: &str) -> Result<(), JamError> {
        self.backend.remove_admin(&self.my_id()?, peer_id).await
    }

    /// Replace our identity's metadata and publish it.
    pub async fn update_info(&self, info: IdentityInfo) -> Result<(), JamError> {
        let slot = self.session.active_slot(self.props().room_id.as_deref()).to_owned();
        let mut identity = self.session.identity(&slot).ok_or(JamError::NoIdentity)?;
        identity.info = info;
        self.backend.put_identity(&identity).await?;
        self.session.set_info(&slot, &identity.info);
        Ok(())
    }

    /// Use `identity` whenever `room_id` is selected.
    pub fn import_room_identity(&self, room_id: &str, identity: &Identity) -> Result<(), JamError> {
        self.session.import_room_identity(room_id, identity)
    }
}

impl fmt::Debug for Jam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jam")
            .field("runtime", &self.runtime)
            .field("backend", &self.backend)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
