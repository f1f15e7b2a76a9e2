//! Admission through the full session: joins, closed rooms, auto-rejoin and
//! one-shot auto-join.

use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::Arc};

use jam_app::{
    Admission, AdmissionInput, AppProps, Jam, JamOptions, PartialRoom, Room, SeededEntropy,
    Signals,
};
use jam_core::{LocalStorage, MemoryStorage};
use jam_store::{KvStore, MemoryStore, room_key};
use proptest::prelude::*;
use serde_json::json;

fn props(room_id: &str) -> AppProps {
    AppProps { room_id: Some(room_id.to_owned()), ..AppProps::default() }
}

fn open_room(moderator: &str) -> Room {
    Room {
        moderators: vec![moderator.to_owned()],
        speakers: vec![moderator.to_owned()],
        ..Room::default()
    }
}

fn session(kv: &Arc<MemoryStore>, storage: &Rc<MemoryStorage>, props: AppProps) -> Jam {
    Jam::new(kv.clone(), JamOptions {
        props,
        storage: Some(storage.clone()),
        entropy: Some(Rc::new(SeededEntropy::new(7))),
        ..JamOptions::default()
    })
}

fn cached(room_id: &str, room: Room) -> HashMap<String, Room> {
    HashMap::from([(room_id.to_owned(), room)])
}

#[test]
fn join_then_close_forces_listener_out() {
    let kv = Arc::new(MemoryStore::new());
    let mut jam = Jam::new(kv, JamOptions {
        props: props("r1"),
        cached_rooms: cached("r1", open_room("owner")),
        entropy: Some(Rc::new(SeededEntropy::new(1))),
        ..JamOptions::default()
    });
    assert!(jam.state().has_room);
    assert_eq!(jam.state().in_room, None);

    jam.enter_room("r1");
    jam.flush();
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));
    assert_eq!(jam.session().joined_rooms().get(&["r1"]), Some(json!(true)));

    jam.backend().cache_rooms(cached("r1", Room { closed: true, ..open_room("owner") }));
    jam.flush();
    assert_eq!(jam.state().in_room, None);
    assert_eq!(jam.session().joined_rooms().get(&["r1"]), None);
}

#[test]
fn leave_room_takes_effect_and_sticks() {
    let kv = Arc::new(MemoryStore::new());
    let mut jam = Jam::new(kv, JamOptions {
        props: props("r1"),
        cached_rooms: cached("r1", open_room("owner")),
        ..JamOptions::default()
    });

    jam.enter_room("r1");
    jam.flush();
    jam.leave_room();
    jam.flush();
    assert_eq!(jam.state().in_room, None);

    jam.set_state("theme", json!("dark"));
    jam.flush();
    assert_eq!(jam.state().in_room, None);
}

#[tokio::test]
async fn moderator_stays_in_closed_room() {
    let kv = Arc::new(MemoryStore::new());
    let storage = Rc::new(MemoryStorage::new());
    let mut jam = session(&kv, &storage, props("r1"));

    jam.create_room("r1", PartialRoom::default()).await.unwrap();
    jam.settle().await;
    assert!(jam.state().i_am_moderator);

    jam.enter_room("r1");
    jam.flush();
    let me = jam.my_id().unwrap();
    jam.update_room("r1", PartialRoom {
        closed: Some(true),
        moderators: Some(vec![me.clone()]),
        speakers: Some(vec![me]),
        ..PartialRoom::default()
    })
    .await
    .unwrap();
    jam.settle().await;

    assert!(jam.state().room.as_ref().unwrap().closed);
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));
}

#[tokio::test]
async fn auto_rejoin_enters_previously_joined_room() {
    let kv = Arc::new(MemoryStore::new());
    kv.set(&room_key("r1"), &json!(open_room("owner"))).await.unwrap();
    let storage = Rc::new(MemoryStorage::new());
    storage.save("jam.joinedRooms", r#"{"r1": true}"#);

    let mut jam = session(&kv, &storage, props("r1"));
    assert!(!jam.state().has_room);
    assert_eq!(jam.state().in_room, None);

    jam.settle().await;
    assert!(jam.state().has_room);
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));
}

#[tokio::test]
async fn auto_rejoin_off_ignores_history() {
    let kv = Arc::new(MemoryStore::new());
    kv.set(&room_key("r1"), &json!(open_room("owner"))).await.unwrap();
    let storage = Rc::new(MemoryStorage::new());
    storage.save("jam.joinedRooms", r#"{"r1": true}"#);

    let mut jam =
        session(&kv, &storage, AppProps { auto_rejoin: false, ..props("r1") });
    jam.settle().await;

    assert!(jam.state().has_room);
    assert_eq!(jam.state().in_room, None);
    assert_eq!(jam.session().joined_rooms().get(&["r1"]), Some(json!(true)));
}

#[tokio::test]
async fn auto_join_fires_once_when_room_arrives_late() {
    let kv = Arc::new(MemoryStore::new());
    let storage = Rc::new(MemoryStorage::new());
    let mut jam = session(&kv, &storage, AppProps { auto_rejoin: false, ..props("r1") });

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    jam.on_state(move |state| sink.borrow_mut().push(state.in_room.clone()));

    jam.auto_join_once();
    jam.flush();
    jam.settle().await;
    assert!(!jam.state().has_room);
    assert_eq!(jam.state().in_room, None);

    kv.set(&room_key("r1"), &json!(open_room("owner"))).await.unwrap();
    jam.reload_room("r1");
    jam.settle().await;
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));

    jam.leave_room();
    jam.flush();
    for _ in 0..2 {
        jam.reload_room("r1");
        jam.settle().await;
        assert!(jam.state().has_room);
        assert_eq!(jam.state().in_room, None);
    }

    let mut entries = seen.borrow().clone();
    entries.dedup();
    let joins = entries.iter().filter(|in_room| in_room.as_deref() == Some("r1")).count();
    assert_eq!(joins, 1);
}

#[test]
fn configured_auto_join_enters_loaded_room() {
    let kv = Arc::new(MemoryStore::new());
    let jam = Jam::new(kv, JamOptions {
        props: AppProps { auto_join: true, ..props("r1") },
        cached_rooms: cached("r1", open_room("owner")),
        ..JamOptions::default()
    });
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));
}

#[test]
fn switching_rooms_starts_fresh_admission() {
    let kv = Arc::new(MemoryStore::new());
    let mut rooms = cached("r1", open_room("owner"));
    rooms.insert("r2".to_owned(), open_room("owner"));
    let mut jam = Jam::new(kv, JamOptions {
        props: AppProps { auto_rejoin: false, ..props("r1") },
        cached_rooms: rooms,
        ..JamOptions::default()
    });

    jam.enter_room("r1");
    jam.flush();
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));

    jam.update_props(|props| props.room_id = Some("r2".to_owned()));
    jam.flush();
    assert_eq!(jam.state().room_id.as_deref(), Some("r2"));
    assert_eq!(jam.state().in_room, None);

    jam.set_props(AppProps { room_id: None, ..AppProps::default() });
    jam.flush();
    assert_eq!(jam.state().in_room, None);
}

#[tokio::test]
async fn auto_join_outlives_leave_before_room_loads() {
    let kv = Arc::new(MemoryStore::new());
    let storage = Rc::new(MemoryStorage::new());
    let mut jam = session(&kv, &storage, AppProps { auto_rejoin: false, ..props("r1") });

    jam.auto_join_once();
    jam.flush();
    jam.leave_room();
    jam.flush();
    assert_eq!(jam.state().in_room, None);

    kv.set(&room_key("r1"), &json!(open_room("owner"))).await.unwrap();
    jam.reload_room("r1");
    jam.settle().await;
    assert!(jam.state().has_room);
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));
}

#[test]
fn configured_auto_join_is_not_renewed_by_switching_rooms() {
    let kv = Arc::new(MemoryStore::new());
    let mut rooms = cached("r1", open_room("owner"));
    rooms.insert("r2".to_owned(), open_room("owner"));
    let mut jam = Jam::new(kv, JamOptions {
        props: AppProps { auto_join: true, auto_rejoin: false, ..props("r1") },
        cached_rooms: rooms,
        ..JamOptions::default()
    });
    assert_eq!(jam.state().in_room.as_deref(), Some("r1"));

    jam.leave_room();
    jam.flush();
    for room_id in ["r2", "r1"] {
        jam.update_props(|props| props.room_id = Some(room_id.to_owned()));
        jam.flush();
        assert_eq!(jam.state().room_id.as_deref(), Some(room_id));
        assert_eq!(jam.state().in_room, None);
    }
}

/// One pass: selected room index, loaded, closed, moderator, the two
/// policies, history bit and signals.
type Pass = (Option<u8>, [bool; 6], Option<Option<u8>>, bool);

fn pass_strategy() -> impl Strategy<Value = Pass> {
    let room = 0..3u8;
    (
        prop::option::of(room.clone()),
        any::<[bool; 6]>(),
        prop::option::of(prop::option::of(room)),
        any::<bool>(),
    )
}

fn room_name(index: u8) -> String {
    format!("r{index}")
}

proptest! {
    /// Rule 1 wins over every signal and policy.
    #[test]
    fn prop_unadmitted_passes_leave_the_room(
        passes in prop::collection::vec(pass_strategy(), 1..40)
    ) {
        let mut admission = Admission::new();
        for (room, flags, join, auto_join) in passes {
            let room_id = room.map(room_name);
            let [has_room, closed, i_am_moderator, configured, auto_rejoin, previously_joined] =
                flags;
            let input = AdmissionInput {
                room_id: room_id.as_deref(),
                has_room,
                closed,
                i_am_moderator,
                auto_join: configured,
                auto_rejoin,
                previously_joined,
            };
            let signals = Signals { join: join.map(|target| target.map(room_name)), auto_join };
            let explicit = signals.join.clone();

            let in_room = admission.step(&input, signals).map(str::to_owned);
            if room_id.is_none() || (closed && !i_am_moderator) {
                prop_assert_eq!(in_room, None);
            } else if let Some(target) = explicit {
                prop_assert_eq!(in_room, target);
            }
        }
    }

    /// Without signals or automatic policies nobody enters a room.
    #[test]
    fn prop_admission_needs_a_reason(passes in prop::collection::vec(pass_strategy(), 1..40)) {
        let mut admission = Admission::new();
        for (room, flags, _, _) in passes {
            let room_id = room.map(room_name);
            let input = AdmissionInput {
                room_id: room_id.as_deref(),
                has_room: flags[0],
                closed: flags[1],
                i_am_moderator: flags[2],
                auto_join: false,
                auto_rejoin: false,
                previously_joined: flags[5],
            };
            prop_assert_eq!(admission.step(&input, Signals::default()), None);
        }
    }
}
