//! Type-indexed registry of injected collaborators.

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    rc::Rc,
};

use crate::error::ComponentError;

/// Collaborators available to components at mount and render time.
///
/// Each service is registered once per concrete type and shared by reference
/// counting. Cloning the registry is cheap.
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<TypeId, (&'static str, Rc<dyn Any>)>,
}

impl Services {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: 'static>(mut self, service: T) -> Self {
        self.insert(service);
        self
    }

    /// Register `service`, replacing any previous service of the same type.
    pub fn insert<T: 'static>(&mut self, service: T) {
        self.entries.insert(TypeId::of::<T>(), (type_name::<T>(), Rc::new(service)));
    }

    /// Look up a service by type.
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        let (_, service) = self.entries.get(&TypeId::of::<T>())?;
        Rc::clone(service).downcast::<T>().ok()
    }

    /// Look up a service that the caller cannot work without.
    pub fn require<T: 'static>(&self) -> Result<Rc<T>, ComponentError> {
        self.get::<T>().ok_or(ComponentError::MissingService { service: type_name::<T>() })
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.values().map(|(name, _)| name)).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Config(&'static str);

    #[test]
    fn lookup_by_type() {
        let services = Services::new().with(Config("dev")).with(7_u32);

        assert_eq!(*services.get::<Config>().unwrap(), Config("dev"));
        assert_eq!(*services.require::<u32>().unwrap(), 7);
        assert!(services.get::<String>().is_none());
    }

    #[test]
    fn missing_service_names_the_type() {
        let err = Services::new().require::<Config>().unwrap_err();
        assert!(matches!(
            err,
            ComponentError::MissingService { service } if service.ends_with("Config")
        ));
    }
}
