//! Runtime driver: owns the graph, runs passes, publishes snapshots.
//!
//! # Invariants
//!
//! - A flush runs passes to completion, one after another; nothing observes
//!   the tree between them.
//! - Actions queued before a flush are delivered to its first pass only.
//! - The published snapshot is replaced wholesale after the last pass of a
//!   flush, and only when the root output changed.

use std::{any::Any, fmt, rc::Rc};

use serde_json::Value;

use crate::{
    action::{ActionType, Dispatcher},
    component::{Component, Key},
    error::GraphError,
    graph::{ErrorObserver, Graph, NodeId, log_error},
    scheduler::Scheduler,
    services::Services,
};

/// Default bound on passes per flush.
pub const DEFAULT_MAX_PASSES: usize = 16;

/// Runtime knobs.
#[derive(Clone)]
pub struct RuntimeOptions {
    /// Log the component tree after every flush.
    pub debug: bool,
    /// Passes a single flush may run before it gives up settling.
    pub max_passes: usize,
    /// Receives evaluation errors. Defaults to [`log_error`].
    pub observer: Option<ErrorObserver>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { debug: false, max_passes: DEFAULT_MAX_PASSES, observer: None }
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("debug", &self.debug)
            .field("max_passes", &self.max_passes)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Handle returned by [`Runtime::on_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Rc<dyn Fn(&Rc<T>)>;

/// A mounted root component `C` and the machinery that keeps it current.
pub struct Runtime<C: Component> {
    scheduler: Rc<Scheduler>,
    graph: Graph,
    root: Option<NodeId>,
    props: C::Props,
    props_pending: bool,
    state: Rc<C::Output>,
    listeners: Vec<(ListenerId, Listener<C::Output>)>,
    next_listener: u64,
    debug: bool,
    max_passes: usize,
    shut_down: bool,
}

impl<C: Component> Runtime<C> {
    /// Create a runtime for root `C`. The root mounts on the first flush.
    pub fn new(props: C::Props, services: Services, options: RuntimeOptions) -> Self {
        let scheduler = Rc::new(Scheduler::default());
        let observer = options.observer.unwrap_or_else(|| Rc::new(log_error));
        let graph = Graph::new(Rc::clone(&scheduler), services, observer);
        scheduler.schedule();

        Self {
            scheduler,
            graph,
            root: None,
            props,
            props_pending: true,
            state: Rc::new(C::Output::default()),
            listeners: Vec::new(),
            next_listener: 0,
            debug: options.debug,
            max_passes: options.max_passes.max(1),
            shut_down: false,
        }
    }

    /// Handle for dispatching actions into this runtime.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Rc::clone(&self.scheduler))
    }

    /// Queue an action. See [`Dispatcher::dispatch`].
    pub fn dispatch(&self, kind: ActionType, payload: Value) -> u64 {
        self.dispatcher().dispatch(kind, payload)
    }

    /// Current snapshot of the root output.
    pub fn state(&self) -> Rc<C::Output> {
        Rc::clone(&self.state)
    }

    /// Current root props.
    pub fn props(&self) -> &C::Props {
        &self.props
    }

    /// Replace the root props.
    pub fn set_props(&mut self, props: C::Props) {
        self.props = props;
        self.props_pending = true;
        self.scheduler.schedule();
    }

    /// Modify the root props in place.
    pub fn update_props(&mut self, update: impl FnOnce(&mut C::Props)) {
        update(&mut self.props);
        self.props_pending = true;
        self.scheduler.schedule();
    }

    /// Call `listener` with every new snapshot.
    pub fn on_state(&mut self, listener: impl Fn(&Rc<C::Output>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it existed.
    pub fn off_state(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Whether a pass is due.
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// Indented dump of the mounted tree.
    pub fn describe(&self) -> String {
        self.root.map(|root| self.graph.describe(root)).unwrap_or_default()
    }

    /// Run the scheduled passes, if any. Returns whether the snapshot changed.
    pub fn flush(&mut self) -> bool {
        if self.shut_down || !self.scheduler.take_scheduled() {
            return false;
        }

        if self.root.is_none() {
            self.root = self.graph.mount::<C>(None, Key::Position(0), &self.props);
            self.props_pending = true;
        }
        let Some(root) = self.root else {
            self.scheduler.settle();
            return false;
        };

        let mut actions = self.scheduler.take_actions();
        let mut passes = 0;
        loop {
            let first = passes == 0;
            self.graph.begin_pass(std::mem::take(&mut actions), first);
            let props = self
                .props_pending
                .then(|| Box::new(self.props.clone()) as Box<dyn Any>);
            self.props_pending = false;
            self.graph.process(root, props);
            self.graph.end_pass();
            passes += 1;

            if !self.graph.needs_pass(root) {
                break;
            }
            if passes >= self.max_passes {
                self.graph.report(&GraphError::Unsettled { passes });
                break;
            }
        }
        self.scheduler.settle();

        if self.debug {
            let tree = self.graph.describe(root);
            tracing::debug!(passes, nodes = self.graph.len(), "tree:\n{}", tree);
        }

        self.publish(self.graph.root_output::<C::Output>(root))
    }

    fn publish(&mut self, output: C::Output) -> bool {
        if output == *self.state {
            return false;
        }
        self.state = Rc::new(output);

        let listeners: Vec<Listener<C::Output>> =
            self.listeners.iter().map(|(_, listener)| Rc::clone(listener)).collect();
        for listener in listeners {
            listener(&self.state);
        }
        true
    }

    /// Wait until a pass is scheduled.
    pub async fn wait(&self) {
        if self.scheduler.is_scheduled() {
            return;
        }
        self.scheduler.wait().await;
    }

    /// Flush whenever a pass is scheduled, until [`shutdown`](Self::shutdown).
    pub async fn run(&mut self) {
        while !self.shut_down {
            self.flush();
            self.wait().await;
        }
    }

    /// Unmount the whole tree. Further flushes do nothing.
    pub fn shutdown(&mut self) {
        if let Some(root) = self.root.take() {
            self.graph.unmount(root);
        }
        self.shut_down = true;
    }

    /// Whether [`shutdown`](Self::shutdown) ran.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl<C: Component> fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("root", &C::name())
            .field("scheduled", &self.scheduler.is_scheduled())
            .field("listeners", &self.listeners.len())
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}
