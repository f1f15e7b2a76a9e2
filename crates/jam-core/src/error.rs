//! Engine error types.

use thiserror::Error;

/// Error raised by a component's `mount` or `render`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// A required service was not provided to the runtime.
    #[error("missing service: {service}")]
    MissingService {
        /// Type name of the missing service.
        service: &'static str,
    },

    /// A store value did not have the expected shape.
    #[error("invalid state at {path}: {reason}")]
    InvalidState {
        /// Slash-separated path of the offending value.
        path: String,
        /// Description of the problem.
        reason: String,
    },

    /// Component-specific failure.
    #[error("{reason}")]
    Failed {
        /// Description of the failure.
        reason: String,
    },
}

impl ComponentError {
    /// Convenience constructor for [`ComponentError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }
}

/// Errors reported by the component graph during a pass.
///
/// None of these abort a pass: the offending subtree keeps its previous output
/// and evaluation continues with its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A component failed to mount or render.
    #[error("component {component} at {location} failed: {source}")]
    Component {
        /// Component name.
        component: &'static str,
        /// Slash-separated location in the tree.
        location: String,
        /// Underlying failure.
        #[source]
        source: ComponentError,
    },

    /// Two children of the same parent declared the same key.
    #[error("duplicate key {key} under {parent}")]
    DuplicateKey {
        /// Location of the parent.
        parent: String,
        /// The duplicated key.
        key: String,
    },

    /// Follow-up passes kept invalidating state.
    #[error("graph did not settle after {passes} passes")]
    Unsettled {
        /// Number of passes run before giving up.
        passes: usize,
    },
}

impl GraphError {
    /// Returns true if the error points at a bug in component code rather than
    /// a runtime condition a retry could clear.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DuplicateKey { .. } | Self::Unsettled { .. } => true,
            Self::Component { source, .. } => !matches!(source, ComponentError::Failed { .. }),
        }
    }
}
