use std::{any::TypeId, collections::HashMap, rc::Rc};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Graph, NodeId};
use crate::{
    action::{Action, ActionType},
    component::{Component, Key},
    error::ComponentError,
    scheduler::Dependency,
    services::Services,
    store::{StateStore, path},
};

/// Evaluation context handed to [`Component::render`].
///
/// Every read made through the scope is recorded as a dependency of the
/// rendering component, and every child it declares is reconciled against the
/// children of the previous render.
pub struct Scope<'g> {
    graph: &'g mut Graph,
    node: NodeId,
    declared: Vec<NodeId>,
    used: Vec<NodeId>,
    positions: HashMap<TypeId, usize>,
    child_failed: bool,
}

impl<'g> Scope<'g> {
    pub(super) fn new(graph: &'g mut Graph, node: NodeId) -> Self {
        Self {
            graph,
            node,
            declared: Vec::new(),
            used: Vec::new(),
            positions: HashMap::new(),
            child_failed: false,
        }
    }

    pub(super) fn finish(self) -> (Vec<NodeId>, Vec<NodeId>, bool) {
        (self.declared, self.used, self.child_failed)
    }

    /// Declare child `C` and return its output for this pass.
    ///
    /// The caller re-renders whenever that output changes.
    pub fn use_component<C: Component>(&mut self, props: C::Props) -> C::Output {
        let key = self.next_position::<C>();
        self.use_keyed::<C>(key, props)
    }

    /// [`use_component`](Self::use_component) with an explicit key.
    pub fn use_keyed<C: Component>(&mut self, key: impl Into<Key>, props: C::Props) -> C::Output {
        match self.declare_child::<C>(key.into(), props) {
            Some(id) => {
                if !self.used.contains(&id) {
                    self.used.push(id);
                }
                self.graph.output::<C::Output>(id)
            },
            None => C::Output::default(),
        }
    }

    /// Declare child `C` for its side effects only.
    pub fn declare<C: Component>(&mut self, props: C::Props) {
        let key = self.next_position::<C>();
        self.declare_keyed::<C>(key, props);
    }

    /// [`declare`](Self::declare) with an explicit key.
    pub fn declare_keyed<C: Component>(&mut self, key: impl Into<Key>, props: C::Props) {
        self.declare_child::<C>(key.into(), props);
    }

    /// Tracked read of `path` in `store`.
    pub fn get<S: AsRef<str>>(&mut self, store: &StateStore, path: &[S]) -> Option<Value> {
        self.track(store, path);
        store.get(path)
    }

    /// Tracked, typed read of `path` in `store`.
    pub fn get_as<T: DeserializeOwned, S: AsRef<str>>(
        &mut self,
        store: &StateStore,
        path: &[S],
    ) -> Option<T> {
        self.track(store, path);
        store.get_as(path)
    }

    /// Payload of the last `kind` action dispatched for this pass.
    ///
    /// `None` when no such action is part of the pass. An action without
    /// payload yields `Some(Value::Null)`.
    pub fn use_action(&mut self, kind: ActionType) -> Option<Value> {
        self.graph.record_observed(self.node, kind);
        let action = self.graph.actions.iter().rev().find(|action| action.kind == kind)?;
        Some(action.payload.clone())
    }

    /// All actions of the given kinds in this pass, in dispatch order.
    pub fn actions(&mut self, kinds: &[ActionType]) -> Vec<Action> {
        for kind in kinds {
            self.graph.record_observed(self.node, *kind);
        }
        self.graph.actions.iter().filter(|action| kinds.contains(&action.kind)).cloned().collect()
    }

    /// Injected collaborators.
    pub fn services(&self) -> &Services {
        self.graph.services()
    }

    /// Required service of type `T`.
    pub fn service<T: 'static>(&self) -> Result<Rc<T>, ComponentError> {
        self.graph.services().require::<T>()
    }

    /// Sequence number of the current pass.
    pub fn pass(&self) -> u64 {
        self.graph.pass()
    }

    fn next_position<C: Component>(&mut self) -> Key {
        let position = self.positions.entry(TypeId::of::<C>()).or_insert(0);
        let key = Key::Position(*position);
        *position += 1;
        key
    }

    fn declare_child<C: Component>(&mut self, key: Key, props: C::Props) -> Option<NodeId> {
        let id = self.graph.child::<C>(self.node, key, props, &self.declared);
        match id {
            Some(id) => self.declared.push(id),
            None => self.child_failed = true,
        }
        id
    }

    fn track<S: AsRef<str>>(&mut self, store: &StateStore, path: &[S]) {
        store.attach(&self.graph.scheduler);
        let dependency = Dependency { store: store.id(), path: self::path(path) };
        self.graph.record_dependency(self.node, dependency);
    }
}
