//! Room, admin and identity operations: validation, permissions and their
//! effect on the published state.

use std::{collections::HashMap, rc::Rc, sync::Arc};

use jam_app::{
    AppProps, Identity, IdentityInfo, Jam, JamError, JamOptions, PartialRoom, Room, SeededEntropy,
};
use jam_store::{ChaoticStore, KvStore, MemoryStore, identity_key};

fn peer(kv: &Arc<MemoryStore>, seed: u64, room_id: Option<&str>) -> Jam {
    Jam::new(kv.clone(), JamOptions {
        props: AppProps { room_id: room_id.map(str::to_owned), ..AppProps::default() },
        entropy: Some(Rc::new(SeededEntropy::new(seed))),
        ..JamOptions::default()
    })
}

#[tokio::test]
async fn creator_moderates_and_speaks() {
    let kv = Arc::new(MemoryStore::new());
    let mut alice = peer(&kv, 1, Some("lobby"));

    let room = alice.create_room("lobby", PartialRoom::default()).await.unwrap();
    let me = alice.my_id().unwrap();
    assert_eq!(room.moderators, vec![me.clone()]);
    assert_eq!(room.speakers, vec![me]);

    alice.settle().await;
    let state = alice.state();
    assert!(state.has_room);
    assert!(state.i_am_moderator);
    assert!(state.i_am_speaker);
    assert_eq!(kv.room_count().await.unwrap(), 1);
}

#[tokio::test]
async fn create_rejects_empty_and_existing_ids() {
    let kv = Arc::new(MemoryStore::new());
    let alice = peer(&kv, 1, None);

    let empty = alice.create_room("", PartialRoom::default()).await.unwrap_err();
    assert!(matches!(empty, JamError::Validation { .. }));

    alice.create_room("lobby", PartialRoom::default()).await.unwrap();
    let again = alice.create_room("lobby", PartialRoom::default()).await.unwrap_err();
    assert_eq!(again, JamError::RoomAlreadyExists { room_id: "lobby".into() });
}

#[tokio::test]
async fn update_without_speakers_is_rejected_and_changes_nothing() {
    let kv = Arc::new(MemoryStore::new());
    let alice = peer(&kv, 1, None);
    let me = alice.my_id().unwrap();
    let created = alice
        .create_room("lobby", PartialRoom { name: Some("Lobby".into()), ..PartialRoom::default() })
        .await
        .unwrap();

    let err = alice
        .update_room("lobby", PartialRoom {
            name: Some("Renamed".into()),
            moderators: Some(vec![me]),
            ..PartialRoom::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, JamError::Validation { .. }));
    assert!(!err.is_transient());

    let stored = alice.backend().load_room("lobby").await.unwrap().unwrap();
    assert_eq!(stored, created);
}

#[tokio::test]
async fn full_update_replaces_settings() {
    let kv = Arc::new(MemoryStore::new());
    let alice = peer(&kv, 1, None);
    let me = alice.my_id().unwrap();
    let created = alice.create_room("lobby", PartialRoom::default()).await.unwrap();

    let update = Room { description: "weekly sync".into(), ..created };
    let updated = alice.update_room("lobby", update.clone().into()).await.unwrap();
    assert_eq!(updated, update);
    assert_eq!(updated.moderators, vec![me]);
}

#[tokio::test]
async fn moderation_requires_moderator() {
    let kv = Arc::new(MemoryStore::new());
    let alice = peer(&kv, 1, None);
    let bob = peer(&kv, 2, None);
    let bob_id = bob.my_id().unwrap();
    let created = alice.create_room("lobby", PartialRoom::default()).await.unwrap();

    let denied = bob.add_speaker("lobby", &bob_id).await.unwrap_err();
    assert!(matches!(denied, JamError::PermissionDenied { ref peer_id, .. } if *peer_id == bob_id));
    let denied = bob.update_room("lobby", created.clone().into()).await.unwrap_err();
    assert!(matches!(denied, JamError::PermissionDenied { .. }));
    assert_eq!(alice.backend().load_room("lobby").await.unwrap(), Some(created));

    let missing = bob.add_moderator("nowhere", &bob_id).await.unwrap_err();
    assert_eq!(missing, JamError::RoomNotFound { room_id: "nowhere".into() });
}

#[tokio::test]
async fn promoted_speaker_sees_role_after_reload() {
    let kv = Arc::new(MemoryStore::new());
    let alice = peer(&kv, 1, None);
    let mut bob = peer(&kv, 2, Some("lobby"));
    let bob_id = bob.my_id().unwrap();
    alice.create_room("lobby", PartialRoom::default()).await.unwrap();

    bob.settle().await;
    assert!(bob.state().has_room);
    assert!(!bob.state().i_am_speaker);

    alice.add_speaker("lobby", &bob_id).await.unwrap();
    alice.add_moderator("lobby", &bob_id).await.unwrap();
    bob.reload_room("lobby");
    bob.settle().await;
    assert!(bob.state().i_am_speaker);
    assert!(bob.state().i_am_moderator);

    alice.remove_speaker("lobby", &bob_id).await.unwrap();
    alice.remove_moderator("lobby", &bob_id).await.unwrap();
    bob.reload_room("lobby");
    bob.settle().await;
    assert!(!bob.state().i_am_speaker);
    assert!(!bob.state().i_am_moderator);
}

#[tokio::test]
async fn first_admin_bootstraps_the_list() {
    let kv = Arc::new(MemoryStore::new());
    let alice = peer(&kv, 1, None);
    let bob = peer(&kv, 2, None);
    let alice_id = alice.my_id().unwrap();
    let bob_id = bob.my_id().unwrap();

    alice.add_admin(&alice_id).await.unwrap();
    let denied = bob.add_admin(&bob_id).await.unwrap_err();
    assert!(matches!(denied, JamError::PermissionDenied { .. }));

    alice.add_admin(&bob_id).await.unwrap();
    bob.remove_admin(&alice_id).await.unwrap();
    assert_eq!(alice.backend().admins().await.unwrap(), vec![bob_id]);

    let denied = alice.remove_admin(&alice_id).await.unwrap_err();
    assert!(matches!(denied, JamError::PermissionDenied { .. }));
}

#[test]
fn cached_rooms_skip_the_fetch() {
    let kv = Arc::new(MemoryStore::new());
    let room = Room { name: "Cached".into(), ..Room::default() };
    let jam = Jam::new(kv, JamOptions {
        props: AppProps { room_id: Some("lobby".into()), ..AppProps::default() },
        cached_rooms: HashMap::from([("lobby".to_owned(), room.clone())]),
        ..JamOptions::default()
    });

    assert!(jam.state().has_room);
    assert_eq!(jam.state().room, Some(room));
    assert!(!jam.backend().has_pending());
}

#[tokio::test]
async fn update_info_publishes_identity() {
    let kv = Arc::new(MemoryStore::new());
    let mut alice = peer(&kv, 1, None);
    let me = alice.my_id().unwrap();

    let info = IdentityInfo { name: Some("Alice".into()), avatar: None };
    alice.update_info(info.clone()).await.unwrap();
    alice.flush();

    assert_eq!(alice.state().my_identity.as_ref().unwrap().info, info);
    let published = kv.get(&identity_key(&me)).await.unwrap().unwrap();
    assert_eq!(published["info"]["name"], "Alice");
    assert_eq!(kv.identity_count().await.unwrap(), 1);
}

#[test]
fn room_identity_applies_while_room_is_selected() {
    let kv = Arc::new(MemoryStore::new());
    let mut alice = peer(&kv, 1, None);
    let default_id = alice.my_id().unwrap();

    let guest = Identity { id: "guest".into(), info: IdentityInfo::default() };
    alice.import_room_identity("lobby", &guest).unwrap();
    alice.update_props(|props| props.room_id = Some("lobby".into()));
    alice.flush();
    assert_eq!(alice.state().my_id.as_deref(), Some("guest"));
    assert_eq!(alice.my_id().unwrap(), "guest");

    alice.update_props(|props| props.room_id = None);
    alice.flush();
    assert_eq!(alice.state().my_id, Some(default_id));
}

#[tokio::test]
async fn store_outage_keeps_cache_and_surfaces_errors() {
    let inner = Arc::new(MemoryStore::new());
    let chaotic = Arc::new(ChaoticStore::new(inner, 1.0, 3));
    let mut jam = Jam::new(chaotic.clone(), JamOptions {
        props: AppProps { room_id: Some("lobby".into()), ..AppProps::default() },
        entropy: Some(Rc::new(SeededEntropy::new(1))),
        ..JamOptions::default()
    });

    jam.settle().await;
    assert!(!jam.state().has_room);
    assert_eq!(jam.backend().cached_room("lobby"), None);

    let err = jam.create_room("lobby", PartialRoom::default()).await.unwrap_err();
    assert!(err.is_transient());
    assert!(chaotic.injected_failures() >= 2);
}
