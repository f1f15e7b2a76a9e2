//! Pass scheduling shared by the runtime, dispatchers and attached stores.

use std::cell::{Cell, RefCell};

use serde_json::Value;
use tokio::sync::Notify;

use crate::{
    action::{Action, ActionType},
    store::{Path, StoreId, paths_overlap},
};

/// A tracked read: which store, and which path inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Dependency {
    pub(crate) store: StoreId,
    pub(crate) path: Path,
}

impl Dependency {
    pub(crate) fn overlaps(&self, other: &Self) -> bool {
        self.store == other.store && paths_overlap(&self.path, &other.path)
    }
}

/// Queues of pending work plus the "a pass is due" flag.
///
/// Everything here is single-threaded; the [`Notify`] only bridges to an
/// async driver loop waiting for the next pass.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    scheduled: Cell<bool>,
    next_sequence: Cell<u64>,
    actions: RefCell<Vec<Action>>,
    invalidated: RefCell<Vec<Dependency>>,
    wake: Notify,
}

impl Scheduler {
    pub(crate) fn schedule(&self) {
        self.scheduled.set(true);
        self.wake.notify_one();
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    pub(crate) fn take_scheduled(&self) -> bool {
        self.scheduled.replace(false)
    }

    /// Re-arm the flag if work arrived while a pass was running.
    pub(crate) fn settle(&self) {
        let pending = !self.actions.borrow().is_empty();
        self.scheduled.set(pending);
    }

    pub(crate) fn enqueue(&self, kind: ActionType, payload: Value) -> u64 {
        let sequence_id = self.next_sequence.get();
        self.next_sequence.set(sequence_id + 1);
        self.actions.borrow_mut().push(Action { kind, payload, sequence_id });
        self.schedule();
        sequence_id
    }

    pub(crate) fn take_actions(&self) -> Vec<Action> {
        std::mem::take(&mut *self.actions.borrow_mut())
    }

    pub(crate) fn invalidate(&self, store: StoreId, path: Path) {
        self.invalidated.borrow_mut().push(Dependency { store, path });
        self.schedule();
    }

    pub(crate) fn take_invalidated(&self) -> Vec<Dependency> {
        std::mem::take(&mut *self.invalidated.borrow_mut())
    }

    pub(crate) async fn wait(&self) {
        self.wake.notified().await;
    }
}
