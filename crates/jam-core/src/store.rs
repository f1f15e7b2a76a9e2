//! Shared Store
//!
//! A mutable JSON document addressed by paths (sequences of string keys) with
//! change notification. Two kinds of observers exist:
//!
//! - Subscribers registered with [`StateStore::on`], invoked synchronously
//!   after every write that touches their path.
//! - Component graphs, which attach themselves on the first tracked read and
//!   receive an invalidation for every changed path.
//!
//! # Invariants
//!
//! - Reads return owned copies. Mutating a retrieved value never affects the
//!   store; the only mutation path is [`set`](StateStore::set),
//!   [`remove`](StateStore::remove) and [`set_many`](StateStore::set_many).
//! - A write that leaves the document unchanged notifies nobody.
//! - A write at path `p` is observed by every observer whose path is a prefix
//!   of `p` or is prefixed by `p`.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::scheduler::Scheduler;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Path into a store document.
pub type Path = Vec<String>;

/// Builds an owned [`Path`] from string segments.
pub fn path<S: AsRef<str>>(segments: &[S]) -> Path {
    segments.iter().map(|segment| segment.as_ref().to_owned()).collect()
}

/// True when one path is a prefix of the other (including equality).
pub(crate) fn paths_overlap<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.as_ref() == y.as_ref())
}

/// Process-unique store identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Handle returned by [`StateStore::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    path: Path,
    callback: Rc<dyn Fn(&Value)>,
}

struct Inner {
    id: StoreId,
    data: RefCell<Value>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_subscription: Cell<u64>,
    schedulers: RefCell<Vec<Weak<Scheduler>>>,
}

/// Shared, path-addressed mutable document.
///
/// Cloning yields another handle to the same document.
#[derive(Clone)]
pub struct StateStore {
    inner: Rc<Inner>,
}

impl StateStore {
    /// Create an empty store (root is an empty object).
    pub fn new() -> Self {
        Self::with_value(Value::Object(Map::new()))
    }

    /// Create a store holding `value` as its root document.
    pub fn with_value(value: Value) -> Self {
        let id = StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Rc::new(Inner {
                id,
                data: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_subscription: Cell::new(0),
                schedulers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Identifier of this store.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Read a copy of the value at `path`. `None` when absent.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let data = self.inner.data.borrow();
        read(&data, path).cloned()
    }

    /// Read and deserialize the value at `path`.
    ///
    /// Values that do not deserialize into `T` are logged and treated as
    /// absent.
    pub fn get_as<T: DeserializeOwned, S: AsRef<str>>(&self, path: &[S]) -> Option<T> {
        let value = self.get(path)?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(store = %self.id(), "ignoring malformed value: {}", e);
                None
            },
        }
    }

    /// Copy of the whole document.
    pub fn snapshot(&self) -> Value {
        self.inner.data.borrow().clone()
    }

    /// Write `value` at `path`, creating intermediate objects.
    ///
    /// Returns whether the document changed.
    pub fn set<S: AsRef<str>>(&self, path: &[S], value: Value) -> bool {
        self.apply(vec![(self::path(path), Some(value))]) > 0
    }

    /// Remove the entry at `path`. Returns whether anything was removed.
    pub fn remove<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.apply(vec![(self::path(path), None)]) > 0
    }

    /// Apply several writes atomically.
    ///
    /// Observers run once, after every write has landed. Returns the number
    /// of writes that changed the document.
    pub fn set_many(&self, writes: impl IntoIterator<Item = (Path, Value)>) -> usize {
        self.apply(writes.into_iter().map(|(path, value)| (path, Some(value))).collect())
    }

    /// Subscribe to writes touching `path`.
    ///
    /// The callback receives the value now stored at `path` (`Null` when
    /// absent).
    pub fn on<S: AsRef<str>>(
        &self,
        path: &[S],
        callback: impl Fn(&Value) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.get());
        self.inner.next_subscription.set(id.0 + 1);
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            path: self::path(path),
            callback: Rc::new(callback),
        });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        subscribers.len() != before
    }

    /// Route future invalidations of this store to `scheduler`.
    pub(crate) fn attach(&self, scheduler: &Rc<Scheduler>) {
        let mut schedulers = self.inner.schedulers.borrow_mut();
        schedulers.retain(|weak| weak.strong_count() > 0);
        let attached = schedulers
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|existing| Rc::ptr_eq(&existing, scheduler)));
        if !attached {
            schedulers.push(Rc::downgrade(scheduler));
        }
    }

    fn apply(&self, writes: Vec<(Path, Option<Value>)>) -> usize {
        let changed: Vec<Path> = {
            let mut data = self.inner.data.borrow_mut();
            writes
                .into_iter()
                .filter_map(|(path, value)| write(&mut data, &path, value).then_some(path))
                .collect()
        };

        if !changed.is_empty() {
            self.notify(&changed);
        }
        changed.len()
    }

    fn notify(&self, changed: &[Path]) {
        let schedulers: Vec<Rc<Scheduler>> =
            self.inner.schedulers.borrow().iter().filter_map(Weak::upgrade).collect();
        for scheduler in &schedulers {
            for path in changed {
                scheduler.invalidate(self.id(), path.clone());
            }
        }

        // Collected first so callbacks may write back into this store.
        let subscribers: Vec<(Path, Rc<dyn Fn(&Value)>)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|subscriber| changed.iter().any(|p| paths_overlap(p, &subscriber.path)))
            .map(|subscriber| (subscriber.path.clone(), Rc::clone(&subscriber.callback)))
            .collect();

        for (path, callback) in subscribers {
            let value = self.get(&path).unwrap_or(Value::Null);
            callback(&value);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for StateStore {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("id", &self.inner.id)
            .field("data", &self.inner.data.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

fn read<'v, S: AsRef<str>>(root: &'v Value, path: &[S]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, segment| node.get(segment.as_ref()))
}

fn object_mut(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

/// Apply one write. `None` removes. Returns whether the document changed.
fn write(root: &mut Value, path: &[String], value: Option<Value>) -> bool {
    apply_write(root, path, value).unwrap_or(false)
}

fn apply_write(root: &mut Value, path: &[String], value: Option<Value>) -> Option<bool> {
    let Some((last, parents)) = path.split_last() else {
        let next = value.unwrap_or_else(|| Value::Object(Map::new()));
        let changed = *root != next;
        *root = next;
        return Some(changed);
    };

    let mut node = root;
    for segment in parents {
        node = if value.is_some() {
            object_mut(node)?
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()))
        } else {
            node.get_mut(segment.as_str())?
        };
    }

    match value {
        Some(value) => {
            let map = object_mut(node)?;
            if map.get(last) == Some(&value) {
                return Some(false);
            }
            map.insert(last.clone(), value);
            Some(true)
        },
        None => Some(node.as_object_mut()?.remove(last).is_some()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_creates_intermediate_objects() {
        let store = StateStore::new();
        assert!(store.set(&["peers", "alice", "inRoom"], json!(true)));

        assert_eq!(store.get(&["peers", "alice"]), Some(json!({"inRoom": true})));
        assert_eq!(store.get(&["peers", "bob"]), None);
    }

    #[test]
    fn identical_write_reports_no_change() {
        let store = StateStore::new();
        assert!(store.set(&["micMuted"], json!(false)));
        assert!(!store.set(&["micMuted"], json!(false)));
    }

    #[test]
    fn reads_are_copies() {
        let store = StateStore::new();
        store.set(&["room"], json!({"speakers": ["a"]}));

        let mut copy = store.get(&["room"]).unwrap();
        copy["speakers"] = json!(["a", "b"]);

        assert_eq!(store.get(&["room", "speakers"]), Some(json!(["a"])));
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let store = StateStore::new();
        assert!(!store.remove(&["nothing", "here"]));

        store.set(&["a", "b"], json!(1));
        assert!(store.remove(&["a", "b"]));
        assert_eq!(store.get(&["a"]), Some(json!({})));
    }

    #[test]
    fn subscriber_sees_writes_above_and_below() {
        let store = StateStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        store.on(&["peers", "alice"], move |value| sink.borrow_mut().push(value.clone()));

        store.set(&["peers", "alice", "micMuted"], json!(true));
        store.set(&["peers"], json!({}));
        store.set(&["peers", "bob", "micMuted"], json!(true));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], json!({"micMuted": true}));
        assert_eq!(seen[1], Value::Null);
    }

    #[test]
    fn set_many_notifies_after_all_writes() {
        let store = StateStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let handle = store.clone();
        store.on(&["inRoom"], move |_| {
            sink.borrow_mut().push(handle.get(&["micMuted"]));
        });

        let changed = store.set_many([
            (path(&["inRoom"]), json!(true)),
            (path(&["micMuted"]), json!(true)),
        ]);

        assert_eq!(changed, 2);
        assert_eq!(*seen.borrow(), vec![Some(json!(true))]);
    }

    #[test]
    fn off_stops_notifications() {
        let store = StateStore::new();
        let count = Rc::new(Cell::new(0));

        let counter = Rc::clone(&count);
        let id = store.on::<&str>(&[], move |_| counter.set(counter.get() + 1));
        store.set(&["x"], json!(1));
        assert!(store.off(id));
        store.set(&["x"], json!(2));

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn get_as_ignores_malformed_values() {
        let store = StateStore::new();
        store.set(&["count"], json!("not a number"));
        assert_eq!(store.get_as::<u32, _>(&["count"]), None);

        store.set(&["count"], json!(3));
        assert_eq!(store.get_as::<u32, _>(&["count"]), Some(3));
    }

    #[test]
    fn overlap_is_prefix_in_either_direction() {
        assert!(paths_overlap(&["a"], &["a", "b"]));
        assert!(paths_overlap(&["a", "b"], &["a"]));
        assert!(paths_overlap::<&str, &str>(&[], &["a"]));
        assert!(!paths_overlap(&["a", "c"], &["a", "b"]));
    }
}
