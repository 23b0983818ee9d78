//! Frozen per-method dispatch table

use crate::{
    container::{Instance, InterceptorEntry},
    error::{Error, Key},
    invocation::{Arguments, Value}
};
use std::{collections::HashMap, fmt, sync::Arc};

/// Points to the body of a bean method
pub type MethodBody = Arc<
    dyn Fn(&Instance, &Arguments) -> Result<Value, Error>
    + Send
    + Sync
>;

/// Describes how calls to one bean method are routed
#[derive(Clone)]
pub enum MethodDispatch {
    /// The method has no interceptors, the body is called directly
    PassThrough(MethodBody),
    /// The method is wrapped by an ordered interceptor chain
    Intercepted {
        /// Interceptors in invocation order
        chain: Arc<[Arc<InterceptorEntry>]>,
        /// The body invoked after the last interceptor proceeds
        body: MethodBody,
    },
}

impl fmt::Debug for MethodDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodDispatch::PassThrough(_) => f.write_str("PassThrough"),
            MethodDispatch::Intercepted { chain, .. } => f
                .debug_struct("Intercepted")
                .field("chain", &chain.iter().map(|link| &link.key).collect::<Vec<_>>())
                .finish_non_exhaustive(),
        }
    }
}

impl MethodDispatch {
    /// Keys of the interceptors wrapping the method, in invocation order
    pub fn chain_keys(&self) -> Vec<Key> {
        match self {
            MethodDispatch::PassThrough(_) => Vec::new(),
            MethodDispatch::Intercepted { chain, .. } => chain
                .iter()
                .map(|link| link.key.clone())
                .collect(),
        }
    }

    /// Returns `true` if the method is wrapped by at least one interceptor
    #[inline]
    pub fn is_intercepted(&self) -> bool {
        matches!(self, MethodDispatch::Intercepted { .. })
    }
}

/// Maps every bean method to its dispatch.
///
/// Built once when the container is built and never mutated afterwards,
/// so concurrent invocations read it without synchronization.
#[derive(Default, Clone)]
pub struct DispatchTable {
    beans: HashMap<Key, HashMap<Key, MethodDispatch>>
}

impl fmt::Debug for DispatchTable {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.beans.iter()).finish()
    }
}

impl DispatchTable {
    #[inline]
    pub(crate) fn insert(&mut self, bean: Key, method: Key, dispatch: MethodDispatch) {
        self.beans
            .entry(bean)
            .or_default()
            .insert(method, dispatch);
    }

    /// Returns the dispatch of a bean method
    #[inline]
    pub fn get(&self, bean: &str, method: &str) -> Option<&MethodDispatch> {
        self.beans
            .get(bean)
            .and_then(|methods| methods.get(method))
    }

    /// Returns `true` if the bean method is wrapped by interceptors
    #[inline]
    pub fn is_intercepted(&self, bean: &str, method: &str) -> bool {
        self.get(bean, method).is_some_and(MethodDispatch::is_intercepted)
    }

    /// Keys of the interceptors wrapping a bean method, in invocation order
    #[inline]
    pub fn chain_of(&self, bean: &str, method: &str) -> Vec<Key> {
        self.get(bean, method)
            .map(MethodDispatch::chain_keys)
            .unwrap_or_default()
    }

    /// Number of registered bean methods
    #[inline]
    pub fn len(&self) -> usize {
        self.beans.values().map(HashMap::len).sum()
    }

    /// Returns `true` if no method is registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
