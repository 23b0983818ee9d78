//! Client indirection for contextual beans and bound bean references

use crate::{
    container::{Container, Inner, Instance, downcast_instance},
    error::{Error, Key},
    invocation::{Arguments, Value}
};
use std::{
    fmt,
    sync::{Arc, Weak}
};

/// An indirection to a contextual bean.
///
/// Every call looks up the instance owned by the context that is active
/// on the current thread and then delegates to it. Holding a proxy never
/// constructs the bean, which lets contextual beans depend on each other.
#[derive(Clone)]
pub struct ClientProxy {
    container: Weak<Inner>,
    bean: Key
}

impl fmt::Debug for ClientProxy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientProxy").field(&self.bean).finish()
    }
}

impl ClientProxy {
    #[inline]
    pub(crate) fn new(container: Weak<Inner>, bean: Key) -> Self {
        Self { container, bean }
    }

    /// Key of the contextual bean behind this proxy
    #[inline]
    pub fn bean(&self) -> &str {
        &self.bean
    }

    /// Looks up the current-context instance
    #[inline]
    pub fn instance(&self) -> Result<Instance, Error> {
        self.container()?.instance(&self.bean)
    }

    /// Looks up the current-context instance downcast to `T`
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.instance().and_then(downcast_instance)
    }

    /// Looks up the current-context instance and invokes one of its methods
    pub fn invoke(&self, method: &str, args: impl Into<Arguments>) -> Result<Value, Error> {
        let container = self.container()?;
        let target = container.instance(&self.bean)?;
        container.dispatch(&self.bean, target, method, args.into())
    }

    #[inline]
    fn container(&self) -> Result<Container, Error> {
        self.container
            .upgrade()
            .map(Container::from_inner)
            .ok_or_else(|| Error::ResolutionAtRuntime {
                bean: self.bean.clone(),
                reason: "container has been dropped"
            })
    }
}

/// A resolved bean bound to its entries in the dispatch table
#[derive(Clone)]
pub struct BeanRef {
    container: Container,
    bean: Key,
    target: Instance
}

impl fmt::Debug for BeanRef {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BeanRef").field(&self.bean).finish()
    }
}

impl BeanRef {
    #[inline]
    pub(crate) fn new(container: Container, bean: Key, target: Instance) -> Self {
        Self { container, bean, target }
    }

    /// Key of the bean
    #[inline]
    pub fn bean(&self) -> &str {
        &self.bean
    }

    /// The type-erased bean instance
    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.target
    }

    /// The bean instance downcast to `T`
    #[inline]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        downcast_instance(self.target.clone())
    }

    /// Invokes a method of the bean, running its interceptor chain if it has one
    #[inline]
    pub fn invoke(&self, method: &str, args: impl Into<Arguments>) -> Result<Value, Error> {
        self.container.dispatch(&self.bean, self.target.clone(), method, args.into())
    }
}
