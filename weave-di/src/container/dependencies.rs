//! Resolved dependencies handed to factories

use super::Container;
use crate::{
    error::{Error, Key},
    proxy::ClientProxy
};
use std::{fmt, sync::Arc};

/// The resolved dependencies of one bean or interceptor, in injection point order
#[derive(Clone)]
pub struct Dependencies {
    container: Container,
    owner: Key,
    targets: Arc<[Key]>
}

impl fmt::Debug for Dependencies {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("owner", &self.owner)
            .field("targets", &self.targets)
            .finish()
    }
}

impl Dependencies {
    #[inline]
    pub(crate) fn new(container: Container, owner: Key, targets: Arc<[Key]>) -> Self {
        Self { container, owner, targets }
    }

    /// Key of the bean or interceptor these dependencies belong to
    #[inline]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Number of injection points
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if there are no injection points
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Key of the bean the injection point at `index` resolved to
    #[inline]
    pub fn key(&self, index: usize) -> Result<&Key, Error> {
        self.targets
            .get(index)
            .ok_or_else(|| Error::NoSuchDependency { bean: self.owner.clone(), index })
    }

    /// Resolves the dependency at `index` right away.
    ///
    /// A contextual dependency is rejected with [`Error::ProxyRequired`]:
    /// it is reached through [`Dependencies::proxy`] only.
    pub fn instance<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, Error> {
        let key = self.key(index)?;
        if self.container.scope_of(key).is_some_and(|scope| scope.is_contextual()) {
            return Err(Error::ProxyRequired {
                bean: self.owner.clone(),
                dependency: key.clone()
            });
        }
        self.container.resolve::<T>(key)
    }

    /// Returns a client proxy for the contextual dependency at `index`
    #[inline]
    pub fn proxy(&self, index: usize) -> Result<ClientProxy, Error> {
        let key = self.key(index)?;
        self.container.proxy(key)
    }

    /// The container that resolves these dependencies
    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }
}
