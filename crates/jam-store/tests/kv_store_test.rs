//! Backing store contract tests.
//!
//! Every implementation must satisfy the same contract:
//! - missing keys read as `None`
//! - `set` then `get` returns an equal document
//! - prefix counts see exactly the keys under the prefix

use std::sync::Arc;

use jam_store::{
    ChaoticStore, KvStore, MemoryStore, RedisStore, identity_key, room_key,
};
use proptest::prelude::*;
use serde_json::{Value, json};

async fn check_contract(store: &dyn KvStore, namespace: &str) {
    let missing = format!("{namespace}rooms/missing");
    assert_eq!(store.get(&missing).await.unwrap(), None);

    let room = json!({
        "name": "Lobby",
        "closed": false,
        "moderators": ["a", "b"],
        "speakers": ["a"],
        "nested": {"list": [1, 2.5, null, "x"]}
    });
    let key = format!("{namespace}rooms/lobby");
    store.set(&key, &room).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(room));

    store.set(&key, &json!({"closed": true})).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(json!({"closed": true})));

    for n in 0..3 {
        store.set(&format!("{namespace}identities/{n}"), &json!({"id": n})).await.unwrap();
    }
    assert_eq!(store.count_by_prefix(&format!("{namespace}rooms/")).await.unwrap(), 1);
    assert_eq!(store.count_by_prefix(&format!("{namespace}identities/")).await.unwrap(), 3);
    assert_eq!(store.count_by_prefix(&format!("{namespace}nothing/")).await.unwrap(), 0);
}

#[tokio::test]
async fn memory_store_satisfies_contract() {
    let store = MemoryStore::new();
    check_contract(&store, "").await;
    assert_eq!(store.room_count().await.unwrap(), 1);
    assert_eq!(store.identity_count().await.unwrap(), 3);
}

/// Needs a reachable server: `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.
#[tokio::test]
#[ignore = "requires a running redis server"]
async fn redis_store_satisfies_contract() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
    let store = RedisStore::connect(&url).await.unwrap();
    let namespace = format!("jam-test-{}/", std::process::id());
    check_contract(&store, &namespace).await;
}

#[tokio::test]
async fn chaotic_store_fails_without_touching_inner_store() {
    let inner = Arc::new(MemoryStore::new());
    let chaos = ChaoticStore::new(inner.clone(), 1.0, 7);

    let result = chaos.set(&room_key("lobby"), &json!({})).await;
    assert!(matches!(result, Err(ref e) if e.is_transient()));
    assert_eq!(inner.get(&room_key("lobby")).await.unwrap(), None);
    assert_eq!(chaos.injected_failures(), 1);
}

#[tokio::test]
async fn chaotic_store_is_reproducible_per_seed() {
    async fn outcomes(seed: u64) -> Vec<bool> {
        let chaos = ChaoticStore::new(Arc::new(MemoryStore::new()), 0.5, seed);
        let mut outcomes = Vec::new();
        for n in 0..32 {
            outcomes.push(chaos.get(&identity_key(&n.to_string())).await.is_ok());
        }
        outcomes
    }

    let first = outcomes(42).await;
    assert_eq!(first, outcomes(42).await);
    assert!(first.contains(&true) && first.contains(&false));
}

#[tokio::test]
async fn chaotic_store_with_zero_rate_is_transparent() {
    let chaos = ChaoticStore::new(Arc::new(MemoryStore::new()), 0.0, 1);
    check_contract(&chaos, "").await;
    assert_eq!(chaos.injected_failures(), 0);
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

proptest! {
    #[test]
    fn prefix_count_matches_distinct_room_keys(
        rooms in prop::collection::hash_set("[a-z0-9]{1,8}", 0..20),
        others in prop::collection::hash_set("[a-z0-9]{1,8}", 0..20),
    ) {
        let store = MemoryStore::new();
        block_on(async {
            for room in &rooms {
                store.set(&room_key(room), &json!({"name": room})).await.unwrap();
            }
            for other in &others {
                store.set(&identity_key(other), &Value::Null).await.unwrap();
            }
        });

        prop_assert_eq!(block_on(store.count_by_prefix("rooms/")).unwrap(), rooms.len());
        prop_assert_eq!(block_on(store.identity_count()).unwrap(), others.len());
    }
}
