//! Interceptor chain execution

use crate::{
    container::{Container, Instance, InterceptorEntry},
    dispatch::MethodBody,
    error::{Error, Key}
};
use smallvec::SmallVec;
use std::{
    any::{Any, type_name},
    collections::HashMap,
    fmt,
    slice::Iter,
    sync::Arc
};

const DEFAULT_CHAIN_CAPACITY: usize = 8;

/// A type-erased value passed to or returned from a bean method
pub type Value = Arc<
    dyn Any
    + Send
    + Sync
>;

/// Wraps a value into a [`Value`]
#[inline]
pub fn value<T: Send + Sync + 'static>(value: T) -> Value {
    Arc::new(value)
}

/// Arguments of one method invocation
#[derive(Clone, Default)]
pub struct Arguments(SmallVec<[Value; 4]>);

impl fmt::Debug for Arguments {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Arguments").field(&self.0.len()).finish()
    }
}

impl From<()> for Arguments {
    #[inline]
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<Vec<Value>> for Arguments {
    #[inline]
    fn from(args: Vec<Value>) -> Self {
        Self(SmallVec::from_vec(args))
    }
}

impl FromIterator<Value> for Arguments {
    #[inline]
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Value;
    type IntoIter = Iter<'a, Value>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Arguments {
    /// Returns the argument at `index` downcast to `T`
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, Error> {
        let arg = self.raw(index)?.clone();
        arg.downcast::<T>()
            .map_err(|_| Error::ResolveFailed(type_name::<T>()))
    }

    /// Returns the type-erased argument at `index`
    #[inline]
    pub fn raw(&self, index: usize) -> Result<&Value, Error> {
        self.0
            .get(index)
            .ok_or(Error::NoSuchArgument(index))
    }

    /// Replaces the argument at `index`
    #[inline]
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), Error> {
        let slot = self.0
            .get_mut(index)
            .ok_or(Error::NoSuchArgument(index))?;
        *slot = value;
        Ok(())
    }

    /// Appends an argument
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Number of arguments
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the call carries no arguments
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the arguments
    #[inline]
    pub fn iter(&self) -> Iter<'_, Value> {
        self.0.iter()
    }
}

/// Builds [`Arguments`] from a list of expressions
///
/// # Example
/// ```no_run
/// use weave_di::args;
///
/// let args = args![10_u64, String::from("EUR")];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Arguments::default()
    };
    ($($arg:expr),+ $(,)?) => {
        [$($crate::value($arg)),+].into_iter().collect::<$crate::Arguments>()
    };
}

/// A cross-cutting behavior that wraps bean method invocations
pub trait Interceptor: Send + Sync {
    /// Runs the behavior for one invocation.
    ///
    /// The implementation may call [`InvocationContext::proceed`] at most once
    /// to continue with the next link, return a result without proceeding,
    /// or fail and abort the chain.
    fn invoke(&self, ctx: &mut InvocationContext) -> Result<Value, Error>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut InvocationContext) -> Result<Value, Error> + Send + Sync
{
    #[inline]
    fn invoke(&self, ctx: &mut InvocationContext) -> Result<Value, Error> {
        self(ctx)
    }
}

/// State of one invocation of an intercepted method
pub struct InvocationContext {
    container: Container,
    bean: Key,
    method: Key,
    target: Instance,
    args: Arguments,
    data: HashMap<Key, Value>,
    chain: Arc<[Arc<InterceptorEntry>]>,
    body: MethodBody,
    position: usize,
    proceeded: SmallVec<[bool; DEFAULT_CHAIN_CAPACITY]>,
}

impl fmt::Debug for InvocationContext {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("bean", &self.bean)
            .field("method", &self.method)
            .field("position", &self.position)
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl InvocationContext {
    #[inline]
    pub(crate) fn new(
        container: Container,
        bean: Key,
        method: Key,
        target: Instance,
        args: Arguments,
        chain: Arc<[Arc<InterceptorEntry>]>,
        body: MethodBody
    ) -> Self {
        let proceeded = SmallVec::from_elem(false, chain.len());
        Self {
            container,
            bean,
            method,
            target,
            args,
            data: HashMap::new(),
            chain,
            body,
            position: 0,
            proceeded,
        }
    }

    /// Runs the chain from its first link
    pub(crate) fn start(mut self) -> Result<Value, Error> {
        if self.chain.is_empty() {
            return (self.body)(&self.target, &self.args);
        }
        self.position = 0;
        self.call_link(0)
    }

    /// Invokes the next link of the chain, or the method body after the last link.
    ///
    /// Each link may proceed at most once, a second call returns
    /// [`Error::AlreadyProceeded`] without running anything.
    pub fn proceed(&mut self) -> Result<Value, Error> {
        let current = self.position;
        match self.proceeded.get_mut(current) {
            Some(flag) if *flag => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    bean = %self.bean,
                    method = %self.method,
                    interceptor = %self.chain[current].key,
                    "proceed called more than once"
                );
                return Err(Error::AlreadyProceeded {
                    bean: self.bean.clone(),
                    method: self.method.clone()
                });
            },
            Some(flag) => *flag = true,
            None => return (self.body)(&self.target, &self.args),
        }

        let next = current + 1;
        if next == self.chain.len() {
            return (self.body)(&self.target, &self.args);
        }

        self.position = next;
        let result = self.call_link(next);
        self.position = current;
        result
    }

    #[inline]
    fn call_link(&mut self, index: usize) -> Result<Value, Error> {
        let link = self.chain[index].clone();
        let interceptor = link.instance(&self.container)?;
        interceptor.invoke(self)
    }

    /// Key of the intercepted bean
    #[inline]
    pub fn bean(&self) -> &str {
        &self.bean
    }

    /// Name of the intercepted method
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Key of the interceptor that is currently running
    #[inline]
    pub fn interceptor(&self) -> Option<&str> {
        self.chain.get(self.position).map(|link| link.key())
    }

    /// Zero-based position of the running link in the chain
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of links in the chain
    #[inline]
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// The target bean instance
    #[inline]
    pub fn target(&self) -> &Instance {
        &self.target
    }

    /// The target bean instance downcast to `T`
    #[inline]
    pub fn target_as<T: Send + Sync + 'static>(&self) -> Result<&T, Error> {
        self.target
            .downcast_ref::<T>()
            .ok_or(Error::ResolveFailed(type_name::<T>()))
    }

    /// Arguments of the invocation
    #[inline]
    pub fn args(&self) -> &Arguments {
        &self.args
    }

    /// Mutable arguments of the invocation, changes are seen by the following links and the body
    #[inline]
    pub fn args_mut(&mut self) -> &mut Arguments {
        &mut self.args
    }

    /// Returns a value shared between the links of this invocation
    #[inline]
    pub fn data<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.data
            .get(key)
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    /// Stores a value visible to the following links of this invocation
    #[inline]
    pub fn insert_data(&mut self, key: impl Into<Key>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    /// The container the intercepted bean belongs to
    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }
}
