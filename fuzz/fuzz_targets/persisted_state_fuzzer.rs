//! Fuzz target for stores loaded from local storage
//!
//! # Strategy
//!
//! - Stored text: arbitrary bytes under the persisted key, valid JSON or not
//! - Writes: arbitrary paths set and removed after loading
//!
//! # Invariants
//!
//! - Unparsable text falls back to the default document
//! - Once the document changed, the saved text parses back to it
//! - NEVER panic on corrupt storage

#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use jam_core::{LocalStorage, MemoryStorage, stored_state};
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

const KEY: &str = "jam.joinedRooms";

#[derive(Debug, Arbitrary)]
enum Write {
    Set { path: Vec<String>, value: Option<bool> },
    Remove { path: Vec<String> },
}

#[derive(Debug, Arbitrary)]
struct Input {
    stored: String,
    writes: Vec<Write>,
}

fuzz_target!(|input: Input| {
    let storage = Rc::new(MemoryStorage::new());
    storage.save(KEY, &input.stored);

    let store = stored_state(storage.clone(), KEY, json!({}));
    if serde_json::from_str::<Value>(&input.stored).is_err() {
        assert_eq!(store.snapshot(), json!({}));
    }

    // The stored text is only replaced by the first write that changes the document.
    let mut written = false;
    for write in input.writes.into_iter().take(64) {
        written |= match write {
            Write::Set { path, value } => store.set(&path, json!(value)),
            Write::Remove { path } => store.remove(&path),
        };

        if let (true, Some(saved)) = (written, storage.load(KEY)) {
            let saved: Value = serde_json::from_str(&saved).unwrap_or(Value::Null);
            assert_eq!(saved, store.snapshot());
        }
    }
});
