//! Jam Core
//!
//! A declarative, dependency-tracked state-composition engine.
//!
//! Components read shared [`StateStore`]s and dispatched actions through a
//! [`Scope`], declare child components, and return a state fragment. The
//! [`Runtime`] re-runs exactly the components whose inputs changed and
//! publishes the root output as an immutable snapshot after every flush.
//!
//! # Architecture
//!
//! - [`store`]: path-addressed JSON documents with change notification.
//! - [`persist`]: stores written through to local storage.
//! - [`action`]: fire-once action queue.
//! - [`graph`]: component arena, keyed reconciliation and invalidation.
//! - [`runtime`]: pass scheduling, settling and snapshot publication.
//!
//! Everything is single-threaded (`Rc`/`RefCell`). The only asynchronous
//! entry point is waiting for the next scheduled pass.

pub mod action;
pub mod component;
pub mod error;
pub mod graph;
pub mod merge;
pub mod persist;
pub mod runtime;
mod scheduler;
pub mod services;
pub mod store;

pub use action::{Action, ActionType, Dispatcher};
pub use component::{Component, Key};
pub use error::{ComponentError, GraphError};
pub use graph::{ErrorObserver, Scope, log_error};
pub use merge::merge;
pub use persist::{FileStorage, LocalStorage, MemoryStorage, stored_state};
pub use runtime::{DEFAULT_MAX_PASSES, ListenerId, Runtime, RuntimeOptions};
pub use services::Services;
pub use store::{Path, StateStore, StoreId, SubscriptionId, path};
