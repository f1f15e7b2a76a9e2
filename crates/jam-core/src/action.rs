//! Action Dispatch Channel
//!
//! Actions are transient: they are queued by [`Dispatcher::dispatch`],
//! delivered to the first evaluation pass that runs afterwards, and dropped
//! when that pass ends. Components observe them with
//! [`Scope::use_action`](crate::Scope::use_action).

use std::{fmt, rc::Rc};

use serde_json::Value;

use crate::scheduler::Scheduler;

/// Name of an action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionType(&'static str);

impl ActionType {
    /// Declare an action kind.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The kind's name.
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A dispatched action.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Kind of action.
    pub kind: ActionType,
    /// Payload (`Null` when the action carries none).
    pub payload: Value,
    /// Monotonic dispatch sequence number.
    pub sequence_id: u64,
}

/// Cloneable handle that injects actions into a runtime.
#[derive(Clone)]
pub struct Dispatcher {
    scheduler: Rc<Scheduler>,
}

impl Dispatcher {
    pub(crate) fn new(scheduler: Rc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Queue an action and schedule a pass. Returns its sequence id.
    ///
    /// Actions dispatched before the next pass runs are delivered together,
    /// in dispatch order.
    pub fn dispatch(&self, kind: ActionType, payload: Value) -> u64 {
        let sequence_id = self.scheduler.enqueue(kind, payload);
        tracing::debug!(action = %kind, sequence_id, "dispatched");
        sequence_id
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("scheduled", &self.scheduler.is_scheduled()).finish()
    }
}
