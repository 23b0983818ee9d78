//! Describes runtime container errors

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    sync::Arc
};

/// Shared key of a bean, method or interceptor inside the container
pub type Key = Arc<str>;

type ArcError = Arc<
    dyn StdError
    + Send
    + Sync
>;

/// Errors surfaced by the container and by wrapped method invocations
#[derive(Debug, Clone)]
pub enum Error {
    /// No bean, method body, interceptor or behavior was registered under the key
    NotRegistered(&'static str, Key),
    /// A contextual bean was looked up without a usable context
    ResolutionAtRuntime {
        /// Key of the contextual bean
        bean: Key,
        /// Why no instance could be found
        reason: &'static str
    },
    /// A bean was requested again while it was still being constructed on this thread
    CircularDependency(Key),
    /// A chain link called `proceed` more than once
    AlreadyProceeded {
        /// Key of the intercepted bean
        bean: Key,
        /// Name of the intercepted method
        method: Key
    },
    /// A dependency was requested with an index the bean does not declare
    NoSuchDependency {
        /// Key of the bean or interceptor
        bean: Key,
        /// Requested injection point index
        index: usize
    },
    /// A method argument was requested with an index the call does not carry
    NoSuchArgument(usize),
    /// A client proxy was requested for a bean that is not contextual
    NotContextual(Key),
    /// A contextual dependency was requested as an instance instead of a client proxy
    ProxyRequired {
        /// Key of the bean or interceptor that declares the dependency
        bean: Key,
        /// Key of the contextual dependency
        dependency: Key
    },
    /// An instance, argument or value could not be downcast to the requested type
    ResolveFailed(&'static str),
    /// A chain link or target body failed; the cause is carried unchanged
    Interception(Failure),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotRegistered(kind, key) => write!(f, "Container Error: {kind} not registered: {key}"),
            Error::ResolutionAtRuntime { bean, reason } => write!(f, "Container Error: unable to resolve contextual bean {bean}: {reason}"),
            Error::CircularDependency(bean) => write!(f, "Container Error: circular construction of bean: {bean}"),
            Error::AlreadyProceeded { bean, method } => write!(f, "Container Error: proceed called more than once in {bean}::{method}"),
            Error::NoSuchDependency { bean, index } => write!(f, "Container Error: bean {bean} has no dependency at index {index}"),
            Error::NoSuchArgument(index) => write!(f, "Container Error: no argument at index {index}"),
            Error::NotContextual(bean) => write!(f, "Container Error: bean is not contextual: {bean}"),
            Error::ProxyRequired { bean, dependency } => write!(f, "Container Error: contextual dependency {dependency} of {bean} must be injected as ClientProxy"),
            Error::ResolveFailed(type_name) => write!(f, "Container Error: unable to resolve the value as: {type_name}"),
            Error::Interception(failure) => failure.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Interception(failure) => Some(failure.cause.as_ref()),
            _ => None
        }
    }
}

impl Error {
    /// Creates an [`Error::Interception`] that carries `err` as its cause
    #[inline]
    pub fn failure(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Interception(Failure::new(err))
    }

    /// Creates an [`Error::Interception`] from a message
    #[inline]
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Interception(Failure::from_message(msg))
    }

    /// Returns the failure if this error was raised by a chain link or a target body
    #[inline]
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Error::Interception(failure) => Some(failure),
            _ => None
        }
    }

    /// Returns `true` if this error means no contextual instance could be found
    #[inline]
    pub fn is_resolution_at_runtime(&self) -> bool {
        matches!(self, Error::ResolutionAtRuntime { .. })
    }
}

/// A failure raised by an interceptor or a method body.
///
/// Cloning a [`Failure`] shares the cause, so the error that reaches the caller
/// of a wrapped method is the very same object the failing link produced.
#[derive(Clone)]
pub struct Failure {
    cause: ArcError
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.cause).finish()
    }
}

impl Display for Failure {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.cause.fmt(f)
    }
}

impl Failure {
    /// Wraps an error into a [`Failure`]
    #[inline]
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        Self { cause: Arc::new(err) }
    }

    /// Creates a [`Failure`] from a plain message
    #[inline]
    pub fn from_message(msg: impl Into<String>) -> Self {
        Self { cause: Arc::new(MessageError(msg.into())) }
    }

    /// Returns the shared cause
    #[inline]
    pub fn cause(&self) -> &ArcError {
        &self.cause
    }

    /// Attempts to downcast the cause to a concrete error type
    #[inline]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause.downcast_ref::<E>()
    }

    /// Returns `true` if both failures share the same cause
    #[inline]
    pub fn same_cause(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }
}

#[derive(Debug)]
struct MessageError(String);

impl Display for MessageError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}
