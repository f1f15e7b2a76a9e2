//! Room, admin and identity persistence on top of the backing KV store.
//!
//! # Architecture
//!
//! Components never wait for the store. Reads go through a read cache (a
//! [`StateStore`] holding `{"rooms": {roomId: Room | null}}`): a component
//! that needs an uncached room calls [`Backend::request`], and the driver
//! performs the queued fetches between passes with
//! [`Backend::fetch_pending`]. Landing a fetch in the cache invalidates the
//! components that asked for it.
//!
//! Mutating operations are async and return their error to the caller. They
//! check permissions against the stored document, never against the cache.
//!
//! # Invariants
//!
//! - A rejected operation writes nothing.
//! - A failed fetch leaves the cache unchanged.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    fmt,
    rc::Rc,
    sync::Arc,
};

use jam_core::StateStore;
use jam_store::{ADMINS_KEY, KvStore, StoreError, identity_key, room_key};
use serde_json::{Value, json};

use crate::{
    error::JamError,
    identity::Identity,
    room::{PartialRoom, Room},
};

/// Store access plus the room read cache.
///
/// Cloning yields another handle to the same cache and queue.
#[derive(Clone)]
pub struct Backend {
    kv: Arc<dyn KvStore>,
    cache: StateStore,
    pending: Rc<RefCell<BTreeSet<String>>>,
}

impl Backend {
    /// Backend over `kv` with an empty cache.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, cache: StateStore::new(), pending: Rc::default() }
    }

    /// Place `rooms` in the cache so they are never fetched.
    pub fn cache_rooms(&self, rooms: HashMap<String, Room>) {
        let writes =
            rooms.into_iter().map(|(room_id, room)| (room_cache_path(&room_id), json!(room)));
        self.cache.set_many(writes);
    }

    /// The read cache.
    pub fn cache(&self) -> &StateStore {
        &self.cache
    }

    /// The backing store.
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Cached room. `None` when not cached, `Some(None)` when known missing.
    pub fn cached_room(&self, room_id: &str) -> Option<Option<Room>> {
        match self.cache.get(&room_cache_path(room_id))? {
            Value::Null => Some(None),
            value => Some(serde_json::from_value(value).ok()),
        }
    }

    /// Queue a fetch of `room_id`.
    pub fn request(&self, room_id: &str) {
        if self.pending.borrow_mut().insert(room_id.to_owned()) {
            tracing::debug!(room_id, "room fetch queued");
        }
    }

    /// Whether fetches are queued.
    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Take the queued fetches.
    pub fn take_pending(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.borrow_mut()).into_iter().collect()
    }

    /// Perform the queued fetches. Returns how many landed in the cache.
    pub async fn fetch_pending(&self) -> usize {
        let mut landed = 0;
        for room_id in self.take_pending() {
            match self.load_room(&room_id).await {
                Ok(room) => {
                    let value = room.map_or(Value::Null, |room| json!(room));
                    self.cache.set(&room_cache_path(&room_id), value);
                    landed += 1;
                },
                Err(e) if e.is_transient() => {
                    tracing::warn!(room_id = %room_id, "room fetch failed: {}", e);
                },
                Err(e) => {
                    tracing::error!(room_id = %room_id, "room fetch failed: {}", e);
                },
            }
        }
        landed
    }

    /// Drop the cached copy of `room_id` and fetch it again.
    pub fn reload_room(&self, room_id: &str) {
        self.cache.remove(&room_cache_path(room_id));
        self.request(room_id);
    }

    /// Stored room, bypassing the cache.
    pub async fn load_room(&self, room_id: &str) -> Result<Option<Room>, JamError> {
        let key = room_key(room_id);
        let Some(value) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        let room = serde_json::from_value(value)
            .map_err(|e| StoreError::Codec { key, reason: e.to_string() })?;
        Ok(Some(room))
    }

    async fn store_room(&self, room_id: &str, room: &Room) -> Result<(), JamError> {
        let value = json!(room);
        self.kv.set(&room_key(room_id), &value).await?;
        self.cache.set(&room_cache_path(room_id), value);
        Ok(())
    }

    /// Create `room_id`. `peer_id` moderates and speaks unless `partial` says
    /// otherwise.
    pub async fn create_room(
        &self,
        peer_id: &str,
        room_id: &str,
        partial: PartialRoom,
    ) -> Result<Room, JamError> {
        if room_id.is_empty() {
            return Err(JamError::validation("room id is empty"));
        }
        if self.load_room(room_id).await?.is_some() {
            return Err(JamError::RoomAlreadyExists { room_id: room_id.to_owned() });
        }

        let owner = vec![peer_id.to_owned()];
        let room =
            Room { moderators: owner.clone(), speakers: owner, ..Room::default() }.merged(partial);
        self.store_room(room_id, &room).await?;
        tracing::info!(room_id, peer_id, "room created");
        Ok(room)
    }

    /// Replace the settings of `room_id`.
    ///
    /// Both `moderators` and `speakers` must be given.
    pub async fn update_room(
        &self,
        peer_id: &str,
        room_id: &str,
        partial: PartialRoom,
    ) -> Result<Room, JamError> {
        if partial.moderators.is_none() || partial.speakers.is_none() {
            return Err(JamError::validation("room update must specify moderators and speakers"));
        }
        let stored = self.moderated_room(peer_id, room_id, "update room").await?;
        let room = stored.merged(partial);
        self.store_room(room_id, &room).await?;
        Ok(room)
    }

    /// Put `target` on the speaker list.
    pub async fn add_speaker(
        &self,
        peer_id: &str,
        room_id: &str,
        target: &str,
    ) -> Result<(), JamError> {
        self.edit_room(peer_id, room_id, "add speakers", |room| insert(&mut room.speakers, target))
            .await
    }

    /// Take `target` off the speaker list.
    pub async fn remove_speaker(
        &self,
        peer_id: &str,
        room_id: &str,
        target: &str,
    ) -> Result<(), JamError> {
        self.edit_room(peer_id, room_id, "remove speakers", |room| {
            remove(&mut room.speakers, target)
        })
        .await
    }

    /// Put `target` on the moderator list.
    pub async fn add_moderator(
        &self,
        peer_id: &str,
        room_id: &str,
        target: &str,
    ) -> Result<(), JamError> {
        self.edit_room(peer_id, room_id, "add moderators", |room| {
            insert(&mut room.moderators, target)
        })
        .await
    }

    /// Take `target` off the moderator list.
    pub async fn remove_moderator(
        &self,
        peer_id: &str,
        room_id: &str,
        target: &str,
    ) -> Result<(), JamError> {
        self.edit_room(peer_id, room_id, "remove moderators", |room| {
            remove(&mut room.moderators, target)
        })
        .await
    }

    async fn moderated_room(
        &self,
        peer_id: &str,
        room_id: &str,
        action: &str,
    ) -> Result<Room, JamError> {
        let room = self
            .load_room(room_id)
            .await?
            .ok_or_else(|| JamError::RoomNotFound { room_id: room_id.to_owned() })?;
        if !room.is_moderator(peer_id) {
            return Err(JamError::denied(peer_id, format!("{action} in {room_id}")));
        }
        Ok(room)
    }

    async fn edit_room(
        &self,
        peer_id: &str,
        room_id: &str,
        action: &str,
        edit: impl FnOnce(&mut Room) -> bool,
    ) -> Result<(), JamError> {
        let mut room = self.moderated_room(peer_id, room_id, action).await?;
        if edit(&mut room) {
            self.store_room(room_id, &room).await?;
            tracing::debug!(room_id, peer_id, action, "room edited");
        }
        Ok(())
    }

    /// Stored admin list.
    pub async fn admins(&self) -> Result<Vec<String>, JamError> {
        let Some(value) = self.kv.get(ADMINS_KEY).await? else {
            return Ok(Vec::new());
        };
        let admins = serde_json::from_value(value)
            .map_err(|e| StoreError::Codec { key: ADMINS_KEY.to_owned(), reason: e.to_string() })?;
        Ok(admins)
    }

    /// Make `target` an admin. Anyone may add the first admin.
    pub async fn add_admin(&self, peer_id: &str, target: &str) -> Result<(), JamError> {
        let mut admins = self.admins().await?;
        if !admins.is_empty() && !admins.iter().any(|id| id == peer_id) {
            return Err(JamError::denied(peer_id, "add admins"));
        }
        if insert(&mut admins, target) {
            self.kv.set(ADMINS_KEY, &json!(admins)).await?;
            tracing::info!(admin = target, "admin added");
        }
        Ok(())
    }

    /// Revoke admin rights of `target`.
    pub async fn remove_admin(&self, peer_id: &str, target: &str) -> Result<(), JamError> {
        let mut admins = self.admins().await?;
        if !admins.iter().any(|id| id == peer_id) {
            return Err(JamError::denied(peer_id, "remove admins"));
        }
        if remove(&mut admins, target) {
            self.kv.set(ADMINS_KEY, &json!(admins)).await?;
            tracing::info!(admin = target, "admin removed");
        }
        Ok(())
    }

    /// Publish `identity` at `identities/<id>`.
    pub async fn put_identity(&self, identity: &Identity) -> Result<(), JamError> {
        if identity.id.is_empty() {
            return Err(JamError::validation("identity id is empty"));
        }
        self.kv.set(&identity_key(&identity.id), &json!(identity)).await?;
        Ok(())
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("cache", &self.cache)
            .field("pending", &self.pending.borrow())
            .finish_non_exhaustive()
    }
}

fn room_cache_path(room_id: &str) -> Vec<String> {
    vec!["rooms".to_owned(), room_id.to_owned()]
}

fn insert(ids: &mut Vec<String>, id: &str) -> bool {
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_owned());
    true
}

fn remove(ids: &mut Vec<String>, id: &str) -> bool {
    let before = ids.len();
    ids.retain(|existing| existing != id);
    ids.len() != before
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jam_store::MemoryStore;

    use super::*;

    fn backend() -> Backend {
        Backend::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn missing_rooms_are_cached_as_null() {
        let backend = backend();
        backend.request("ghost");
        backend.request("ghost");

        assert_eq!(backend.fetch_pending().await, 1);
        assert_eq!(backend.cached_room("ghost"), Some(None));
        assert!(!backend.has_pending());
    }

    #[tokio::test]
    async fn edits_are_idempotent() {
        let backend = backend();
        backend.create_room("alice", "lobby", PartialRoom::default()).await.unwrap();

        backend.add_speaker("alice", "lobby", "bob").await.unwrap();
        backend.add_speaker("alice", "lobby", "bob").await.unwrap();
        let room = backend.load_room("lobby").await.unwrap().unwrap();
        assert_eq!(room.speakers, vec!["alice", "bob"]);

        backend.remove_speaker("alice", "lobby", "carol").await.unwrap();
        assert_eq!(backend.cached_room("lobby"), Some(Some(room)));
    }

    #[tokio::test]
    async fn reload_refetches() {
        let backend = backend();
        backend.cache_rooms(HashMap::from([("lobby".to_owned(), Room::default())]));
        assert!(backend.cached_room("lobby").is_some());

        backend.reload_room("lobby");
        assert_eq!(backend.cached_room("lobby"), None);
        assert_eq!(backend.take_pending(), vec!["lobby".to_owned()]);
    }
}
