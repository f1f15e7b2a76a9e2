//! Sessions backed by files survive a restart.

use std::{collections::HashMap, path::Path, rc::Rc, sync::Arc};

use jam_app::{AppProps, Jam, JamOptions, Room, SeededEntropy};
use jam_core::FileStorage;
use jam_store::MemoryStore;
use serde_json::json;

fn lobby() -> HashMap<String, Room> {
    let room = Room {
        moderators: vec!["owner".to_owned()],
        speakers: vec!["owner".to_owned()],
        ..Room::default()
    };
    HashMap::from([("lobby".to_owned(), room)])
}

fn open(dir: &Path, seed: u64) -> Jam {
    Jam::new(Arc::new(MemoryStore::new()), JamOptions {
        props: AppProps { room_id: Some("lobby".to_owned()), ..AppProps::default() },
        cached_rooms: lobby(),
        storage: Some(Rc::new(FileStorage::new(dir))),
        entropy: Some(Rc::new(SeededEntropy::new(seed))),
        ..JamOptions::default()
    })
}

#[test]
fn restart_keeps_identity_and_rejoins() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = open(dir.path(), 1);
    let me = first.my_id().unwrap();
    first.enter_room("lobby");
    first.flush();
    assert_eq!(first.state().in_room.as_deref(), Some("lobby"));
    first.shutdown();
    drop(first);

    let second = open(dir.path(), 2);
    assert_eq!(second.my_id().unwrap(), me);
    assert_eq!(second.session().joined_rooms().get(&["lobby"]), Some(json!(true)));
    assert_eq!(second.state().in_room.as_deref(), Some("lobby"));
}

#[test]
fn leaving_before_restart_is_remembered() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = open(dir.path(), 3);
    first.enter_room("lobby");
    first.flush();
    first.leave_room();
    first.flush();
    drop(first);

    let second = open(dir.path(), 3);
    assert_eq!(second.session().joined_rooms().get(&["lobby"]), None);
    assert_eq!(second.state().in_room, None);
}
