//! Reactive Component Graph
//!
//! An arena of mounted component instances, re-evaluated incrementally.
//!
//! # Architecture
//!
//! Evaluation is top-down: [`Graph::process`] visits a node, renders it if
//! one of its inputs changed, and the render visits the children it declares
//! through its [`Scope`]. Invalidation is bottom-up: a store write or an
//! observed action marks the reading node `dirty` and every ancestor
//! `dirty_below`, so the next pass walks only the paths leading to work.
//!
//! A node renders when:
//!
//! - it has never rendered,
//! - it is `dirty` (a tracked read was invalidated, or it observes an action
//!   kind dispatched for this pass),
//! - its parent passed props that differ from the last ones, or
//! - the output of a child it `use`d changed while refreshing its subtree.
//!
//! # Invariants
//!
//! - A parent reads child outputs only after the child was processed in the
//!   same pass; no stale child output is ever observed.
//! - Once a `use`d child changed, its later siblings are left to the parent's
//!   render, so they never render with props derived from the old output.
//! - Dependencies are reset at the start of every render and re-recorded by
//!   the reads that render performs.
//! - Children not declared by a successful render are unmounted in post-order
//!   and removed from the arena, so their cleanup runs exactly once.
//! - A failed render keeps the previous output and children and is retried on
//!   the first pass of the next flush.

mod instance;
mod scope;

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Write as _,
    rc::Rc,
};

use instance::{ErasedInstance, Instance};
pub use scope::Scope;

use crate::{
    action::{Action, ActionType},
    component::{Component, Key},
    error::GraphError,
    scheduler::{Dependency, Scheduler},
    services::Services,
};

/// Callback receiving every error reported during evaluation.
pub type ErrorObserver = Rc<dyn Fn(&GraphError)>;

/// Observer used when none is supplied: logs through `tracing`.
pub fn log_error(error: &GraphError) {
    tracing::error!(fatal = error.is_fatal(), "evaluation error: {}", error);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u64);

struct Node {
    name: &'static str,
    key: Key,
    type_id: TypeId,
    parent: Option<NodeId>,
    /// Taken out while the node renders.
    instance: Option<Box<dyn ErasedInstance>>,
    children: Vec<NodeId>,
    used: Vec<NodeId>,
    deps: Vec<Dependency>,
    observed: Vec<ActionType>,
    dirty: bool,
    dirty_below: bool,
    failed: bool,
    rendered: bool,
    changed_in: u64,
}

pub(crate) struct Graph {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    scheduler: Rc<Scheduler>,
    services: Services,
    observer: ErrorObserver,
    actions: Vec<Action>,
    pass: u64,
}

impl Graph {
    pub(crate) fn new(
        scheduler: Rc<Scheduler>,
        services: Services,
        observer: ErrorObserver,
    ) -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 0,
            scheduler,
            services,
            observer,
            actions: Vec::new(),
            pass: 0,
        }
    }

    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    pub(crate) fn pass(&self) -> u64 {
        self.pass
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Start a pass delivering `actions`.
    ///
    /// Observers of the delivered kinds are marked dirty, and so are failed
    /// nodes when `retry_failed` is set.
    pub(crate) fn begin_pass(&mut self, actions: Vec<Action>, retry_failed: bool) {
        self.pass += 1;
        self.actions = actions;

        let wake: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| {
                (retry_failed && node.failed)
                    || node.observed.iter().any(|kind| self.actions.iter().any(|a| a.kind == *kind))
            })
            .map(|(id, _)| *id)
            .collect();

        for id in wake {
            self.mark_dirty(id);
        }
    }

    /// Drop the pass's actions.
    pub(crate) fn end_pass(&mut self) {
        self.actions.clear();
        self.absorb_invalidations();
    }

    /// Whether anything below `root` still needs evaluation.
    pub(crate) fn needs_pass(&mut self, root: NodeId) -> bool {
        self.absorb_invalidations();
        self.nodes.get(&root).is_some_and(|node| node.dirty || node.dirty_below)
    }

    /// Mount a component without rendering it. Mount failures are reported
    /// and yield `None`.
    pub(crate) fn mount<C: Component>(
        &mut self,
        parent: Option<NodeId>,
        key: Key,
        props: &C::Props,
    ) -> Option<NodeId> {
        match Instance::<C>::mount(props, &self.services) {
            Ok(instance) => {
                let id = NodeId(self.next_id);
                self.next_id += 1;
                self.nodes.insert(id, Node {
                    name: C::name(),
                    key,
                    type_id: TypeId::of::<C>(),
                    parent,
                    instance: Some(Box::new(instance)),
                    children: Vec::new(),
                    used: Vec::new(),
                    deps: Vec::new(),
                    observed: Vec::new(),
                    dirty: false,
                    dirty_below: false,
                    failed: false,
                    rendered: false,
                    changed_in: 0,
                });
                tracing::debug!(component = C::name(), node = id.0, "mounted");
                Some(id)
            },
            Err(source) => {
                let location = match parent {
                    Some(parent) => {
                        format!("{}/{}", self.location(parent), segment(C::name(), &key))
                    },
                    None => format!("/{}", segment(C::name(), &key)),
                };
                self.report(&GraphError::Component { component: C::name(), location, source });
                None
            },
        }
    }

    /// Bring `id` and its subtree up to date for the current pass.
    pub(crate) fn process(&mut self, id: NodeId, props: Option<Box<dyn Any>>) {
        self.absorb_invalidations();

        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let Some(instance) = node.instance.as_ref() else {
            return;
        };

        let props_changed = props.as_ref().is_some_and(|props| !instance.props_eq(&**props));
        let mut render = !node.rendered || node.dirty || props_changed;

        if !render && node.dirty_below {
            let children = node.children.clone();
            let used = node.used.clone();
            // Later siblings may take props from this child's output, so once a
            // used child changed they are left to the parent's render.
            for child in children {
                self.process(child, None);
                let changed = self.nodes.get(&child).is_some_and(|c| c.changed_in == self.pass);
                if changed && used.contains(&child) {
                    render = true;
                    break;
                }
            }
            // A child may have invalidated this node while it ran.
            render |= self.nodes.get(&id).is_some_and(|node| node.dirty);
        }

        if render {
            self.render(id, props);
        }
        self.refresh_dirty_below(id);
    }

    fn render(&mut self, id: NodeId, props: Option<Box<dyn Any>>) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let Some(mut instance) = node.instance.take() else {
            return;
        };
        node.deps.clear();
        node.observed.clear();
        node.dirty = false;
        let name = node.name;
        let previous_children = node.children.clone();
        let previous_used = node.used.clone();

        let mut scope = Scope::new(self, id);
        let result = instance.render(props, &mut scope);
        let (declared, used, child_failed) = scope.finish();

        let pass = self.pass;
        let outcome = match result {
            Ok(changed) => {
                let stale: Vec<NodeId> =
                    previous_children.iter().copied().filter(|c| !declared.contains(c)).collect();
                for child in stale {
                    self.unmount(child);
                }
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.children = declared;
                    node.used = used;
                    node.failed = child_failed;
                    if changed {
                        node.changed_in = pass;
                    }
                }
                Ok(())
            },
            Err(source) => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    let mut children = previous_children;
                    children.extend(declared.into_iter().filter(|c| !node.children.contains(c)));
                    node.children = children;
                    let mut all_used = previous_used;
                    all_used.extend(used.into_iter().filter(|c| !node.used.contains(c)));
                    node.used = all_used;
                    node.failed = true;
                }
                Err(source)
            },
        };

        if let Some(node) = self.nodes.get_mut(&id) {
            node.instance = Some(instance);
            node.rendered = true;
        }

        if let Err(source) = outcome {
            let location = self.location(id);
            self.report(&GraphError::Component { component: name, location, source });
        }
    }

    /// Unmount `id` and its subtree, children first.
    pub(crate) fn unmount(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for child in node.children.iter().rev() {
            self.unmount(*child);
        }
        if let Some(mut instance) = node.instance {
            instance.unmount();
        }
        tracing::debug!(component = node.name, node = id.0, "unmounted");
    }

    /// Locate or mount the child of `parent` for (`C`, `key`) and process it.
    ///
    /// `declared` holds the children already declared by the current render.
    /// Duplicate keys and mount failures are reported and yield `None`.
    fn child<C: Component>(
        &mut self,
        parent: NodeId,
        key: Key,
        props: C::Props,
        declared: &[NodeId],
    ) -> Option<NodeId> {
        let type_id = TypeId::of::<C>();
        let matches = |node: &Node| node.type_id == type_id && node.key == key;

        if declared.iter().any(|id| self.nodes.get(id).is_some_and(matches)) {
            let error =
                GraphError::DuplicateKey { parent: self.location(parent), key: key.to_string() };
            self.report(&error);
            return None;
        }

        let existing = self.nodes.get(&parent).and_then(|node| {
            node.children.iter().copied().find(|id| self.nodes.get(id).is_some_and(matches))
        });

        let id = match existing {
            Some(id) => id,
            None => self.mount::<C>(Some(parent), key, &props)?,
        };
        self.process(id, Some(Box::new(props)));
        Some(id)
    }

    fn output<T: Clone + Default + 'static>(&self, id: NodeId) -> T {
        self.nodes
            .get(&id)
            .and_then(|node| node.instance.as_ref())
            .and_then(|instance| instance.output().downcast_ref::<T>().cloned())
            .unwrap_or_default()
    }

    pub(crate) fn root_output<T: Clone + Default + 'static>(&self, root: NodeId) -> T {
        self.output(root)
    }

    fn record_dependency(&mut self, id: NodeId, dependency: Dependency) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if !node.deps.contains(&dependency) {
                node.deps.push(dependency);
            }
        }
    }

    fn record_observed(&mut self, id: NodeId, kind: ActionType) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if !node.observed.contains(&kind) {
                node.observed.push(kind);
            }
        }
    }

    fn absorb_invalidations(&mut self) {
        let changed = self.scheduler.take_invalidated();
        if changed.is_empty() {
            return;
        }

        let hits: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.deps.iter().any(|dep| changed.iter().any(|c| dep.overlaps(c))))
            .map(|(id, _)| *id)
            .collect();

        for id in hits {
            self.mark_dirty(id);
        }
    }

    fn mark_dirty(&mut self, id: NodeId) {
        let mut parent = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.dirty = true;
                node.parent
            },
            None => return,
        };
        while let Some(id) = parent {
            let Some(node) = self.nodes.get_mut(&id) else {
                break;
            };
            node.dirty_below = true;
            parent = node.parent;
        }
    }

    fn refresh_dirty_below(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let dirty_below = node
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .any(|child| child.dirty || child.dirty_below);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.dirty_below = dirty_below;
        }
    }

    pub(crate) fn report(&self, error: &GraphError) {
        (self.observer)(error);
    }

    fn location(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            segments.push(segment(node.name, &node.key));
            current = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Indented dump of the subtree at `root`.
    pub(crate) fn describe(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.describe_into(root, 0, &mut out);
        out
    }

    fn describe_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let _ = write!(
            out,
            "{:indent$}{} key={} deps={}",
            "",
            node.name,
            node.key,
            node.deps.len(),
            indent = depth * 2
        );
        if !node.observed.is_empty() {
            let kinds: Vec<&str> = node.observed.iter().map(|kind| kind.name()).collect();
            let _ = write!(out, " actions=[{}]", kinds.join(","));
        }
        if node.failed {
            out.push_str(" failed");
        }
        out.push('\n');
        for child in &node.children {
            self.describe_into(*child, depth + 1, out);
        }
    }
}

fn segment(name: &str, key: &Key) -> String {
    match key {
        Key::Position(0) => name.to_owned(),
        key => format!("{name}[{key}]"),
    }
}
