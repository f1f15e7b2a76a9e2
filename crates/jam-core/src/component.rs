//! Component trait and child keys.

use std::{any::type_name, fmt};

use crate::{error::ComponentError, graph::Scope, services::Services};

/// A reusable unit of reactive computation.
///
/// The component value itself is the instance's local state: it is created by
/// [`mount`](Component::mount), kept across renders for as long as the parent
/// keeps declaring it under the same key, and dropped after
/// [`unmount`](Component::unmount).
///
/// `render` must be a function of its props, the tracked reads and actions it
/// performs through the [`Scope`], and its local state. The graph re-runs it
/// only when one of those inputs changed.
pub trait Component: Sized + 'static {
    /// Input supplied by the parent.
    type Props: Clone + PartialEq + 'static;

    /// Fragment returned to a parent that `use`s this component.
    ///
    /// `Default` is what a parent sees while the component has never rendered
    /// successfully.
    type Output: Clone + PartialEq + Default + 'static;

    /// Create the local state for a freshly keyed instance.
    fn mount(props: &Self::Props, services: &Services) -> Result<Self, ComponentError>;

    /// Evaluate the component for this pass.
    fn render(
        &mut self,
        props: &Self::Props,
        cx: &mut Scope<'_>,
    ) -> Result<Self::Output, ComponentError>;

    /// Cleanup. Runs exactly once, after the instance's children were
    /// unmounted.
    fn unmount(&mut self) {}

    /// Name used in logs and tree dumps.
    fn name() -> &'static str {
        let full = type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Identity of a child among its siblings of the same component type.
///
/// Unkeyed declarations are numbered by position, counting only earlier
/// unkeyed declarations of the same type in the same render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// N-th unkeyed declaration.
    Position(usize),
    /// Explicit key.
    Named(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(index) => write!(f, "#{index}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}
