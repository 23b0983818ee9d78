//! Contexts that own the instances of contextual beans

use super::{Cached, Instance};
use crate::error::{Error, Key};
use dashmap::DashMap;
use std::{
    cell::RefCell,
    fmt,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering}
    }
};

type Slot = Arc<Cached<Instance>>;

thread_local! {
    static ACTIVE_CONTEXTS: RefCell<Vec<Arc<ContextStore>>> = const { RefCell::new(Vec::new()) };
}

/// Returns the innermost context activated on this thread for the given container
pub(crate) fn current(container: u64) -> Option<Arc<ContextStore>> {
    ACTIVE_CONTEXTS.with_borrow(|stack| stack
        .iter()
        .rev()
        .find(|store| store.container == container)
        .cloned())
}

pub(crate) struct ContextStore {
    container: u64,
    id: u64,
    instances: DashMap<Key, Slot>,
    ended: AtomicBool,
}

impl ContextStore {
    /// Returns the slot of a bean, inserting an empty one if absent.
    ///
    /// The map lock is released before the caller initializes the slot,
    /// so constructing one bean may access other beans of the same context.
    /// A slot inserted while the context ends is taken out again,
    /// so no instance outlives [`ContextHandle::end`].
    pub(crate) fn slot(&self, key: &Key) -> Result<Slot, Error> {
        self.ensure_active(key)?;
        let slot = Arc::clone(&self.instances.entry(key.clone()).or_default());
        if let Err(err) = self.ensure_active(key) {
            self.instances.remove(key);
            return Err(err);
        }
        Ok(slot)
    }

    #[inline]
    fn ensure_active(&self, key: &Key) -> Result<(), Error> {
        if self.ended.load(Ordering::Acquire) {
            return Err(Error::ResolutionAtRuntime {
                bean: key.clone(),
                reason: "context has ended"
            });
        }
        Ok(())
    }
}

/// A handle to one context, e.g. one logical request.
///
/// Each context owns at most one instance per contextual bean.
/// Handles are cheap to clone and can be shared between threads that
/// work on behalf of the same context.
#[derive(Clone)]
pub struct ContextHandle {
    store: Arc<ContextStore>
}

impl fmt::Debug for ContextHandle {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.store.id)
            .field("instances", &self.store.instances.len())
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl ContextHandle {
    #[inline]
    pub(crate) fn new(container: u64, id: u64) -> Self {
        let store = ContextStore {
            container,
            id,
            instances: DashMap::new(),
            ended: AtomicBool::new(false),
        };
        Self { store: Arc::new(store) }
    }

    /// Identity of this context within its container
    #[inline]
    pub fn id(&self) -> u64 {
        self.store.id
    }

    /// Number of contextual instances created in this context so far
    #[inline]
    pub fn len(&self) -> usize {
        self.store.instances
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    /// Returns `true` if no contextual instance has been created yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`ContextHandle::end`] was called
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.store.ended.load(Ordering::Acquire)
    }

    /// Makes this context the current one on this thread until the guard is dropped
    pub fn activate(&self) -> ActiveContext {
        ACTIVE_CONTEXTS.with_borrow_mut(|stack| stack.push(self.store.clone()));
        ActiveContext {
            store: self.store.clone(),
            _not_send: PhantomData
        }
    }

    /// Runs `f` with this context active on the current thread
    #[inline]
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _active = self.activate();
        f()
    }

    /// Ends the context and destroys its instances.
    ///
    /// Any later lookup through this context fails.
    pub fn end(&self) {
        self.store.ended.store(true, Ordering::Release);
        self.store.instances.clear();

        #[cfg(feature = "tracing")]
        tracing::trace!(context = self.store.id, "context ended");
    }
}

/// A guard that keeps a context active on the current thread
pub struct ActiveContext {
    store: Arc<ContextStore>,
    _not_send: PhantomData<*const ()>
}

impl fmt::Debug for ActiveContext {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveContext").field(&self.store.id).finish()
    }
}

impl Drop for ActiveContext {
    fn drop(&mut self) {
        ACTIVE_CONTEXTS.with_borrow_mut(|stack| {
            if let Some(pos) = stack.iter().rposition(|store| Arc::ptr_eq(store, &self.store)) {
                stack.remove(pos);
            }
        });
    }
}
