//! Stores whose document survives restarts.
//!
//! A [`StateStore`] returned by [`stored_state`] loads its document from a
//! [`LocalStorage`] backend once and writes the whole document back after
//! every change.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use serde_json::Value;

use crate::store::StateStore;

/// Key/value text storage for persisted documents.
pub trait LocalStorage {
    /// Stored text under `key`, if any.
    fn load(&self, key: &str) -> Option<String>;

    /// Replace the text under `key`.
    fn save(&self, key: &str, contents: &str);
}

/// In-memory backend, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, contents: &str) {
        self.entries.borrow_mut().insert(key.to_owned(), contents.to_owned());
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.file(key), contents)
    }
}

impl LocalStorage for FileStorage {
    fn load(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.file(key)) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, "failed to read persisted state: {}", e);
                None
            },
        }
    }

    fn save(&self, key: &str, contents: &str) {
        if let Err(e) = self.write(key, contents) {
            tracing::warn!(key, dir = %self.dir.display(), "failed to persist state: {}", e);
        }
    }
}

/// Create a store backed by `storage` under `key`.
///
/// Starts from the stored document, or from `default` when nothing usable is
/// stored.
pub fn stored_state(storage: Rc<dyn LocalStorage>, key: &str, default: Value) -> StateStore {
    let initial = match storage.load(key) {
        Some(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(key, "discarding unparsable persisted state: {}", e);
            default
        }),
        None => default,
    };

    let store = StateStore::with_value(initial);
    let key = key.to_owned();
    store.on::<&str>(&[], move |document| match serde_json::to_string(document) {
        Ok(contents) => storage.save(&key, &contents),
        Err(e) => tracing::warn!(key = %key, "failed to encode persisted state: {}", e),
    });
    store
}
