//! Runtime container for Weave: scoped bean instances, client proxies
//! and interceptor chain execution through a frozen dispatch table

pub use crate::{
    container::{
        ActiveContext,
        Container,
        ContainerBuilder,
        ContextHandle,
        Dependencies,
        FromDependencies,
        FromDependency,
        GenericFactory,
        Instance,
        InterceptorEntry,
        Scope,
    },
    dispatch::{DispatchTable, MethodBody, MethodDispatch},
    error::{Error, Failure, Key},
    invocation::{Arguments, Interceptor, InvocationContext, Value, value},
    proxy::{BeanRef, ClientProxy},
};

pub mod error;
pub mod container;
pub mod dispatch;
pub mod invocation;
pub mod proxy;
#[cfg(feature = "tracing")]
pub mod tracing;
