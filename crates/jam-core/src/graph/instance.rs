//! Type erasure over mounted components.

use std::any::Any;

use super::Scope;
use crate::{component::Component, error::ComponentError, services::Services};

/// A mounted component with its last props and last successful output.
pub(crate) trait ErasedInstance {
    fn props_eq(&self, props: &dyn Any) -> bool;

    /// Render with `props` (or the last props when `None`).
    ///
    /// Returns whether the output changed. On error the new props are kept
    /// but the previous output stays in place.
    fn render(
        &mut self,
        props: Option<Box<dyn Any>>,
        cx: &mut Scope<'_>,
    ) -> Result<bool, ComponentError>;

    fn output(&self) -> &dyn Any;

    fn unmount(&mut self);
}

pub(crate) struct Instance<C: Component> {
    component: C,
    props: C::Props,
    output: C::Output,
}

impl<C: Component> Instance<C> {
    pub(crate) fn mount(props: &C::Props, services: &Services) -> Result<Self, ComponentError> {
        let component = C::mount(props, services)?;
        Ok(Self { component, props: props.clone(), output: C::Output::default() })
    }
}

impl<C: Component> ErasedInstance for Instance<C> {
    fn props_eq(&self, props: &dyn Any) -> bool {
        props.downcast_ref::<C::Props>().is_some_and(|props| *props == self.props)
    }

    fn render(
        &mut self,
        props: Option<Box<dyn Any>>,
        cx: &mut Scope<'_>,
    ) -> Result<bool, ComponentError> {
        if let Some(props) = props.and_then(|props| props.downcast::<C::Props>().ok()) {
            self.props = *props;
        }

        let output = self.component.render(&self.props, cx)?;
        let changed = output != self.output;
        self.output = output;
        Ok(changed)
    }

    fn output(&self) -> &dyn Any {
        &self.output
    }

    fn unmount(&mut self) {
        self.component.unmount();
    }
}
