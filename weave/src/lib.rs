//! Weave resolves a catalog of declared beans and interceptors into a validated
//! deployment: every injection point bound to exactly one bean, every
//! intercepted method given a deterministic interceptor chain, and every
//! wrapper a code emitter has to produce described as plain data.
//!
//! The runtime side lives in [`di`].
//!
//! # Example
//! ```no_run
//! use weave::{
//!     Deployment,
//!     catalog::{BeanDescriptor, TypeCatalog},
//! };
//!
//! let catalog = TypeCatalog::builder()
//!     .bean(BeanDescriptor::new("bar", "Bar").scope("singleton"))
//!     .bean(BeanDescriptor::new("foo", "Foo").inject("Bar"))
//!     .build();
//!
//! let deployment = Deployment::deploy(&catalog).unwrap();
//! assert_eq!(deployment.graph().dependencies_of("foo"), ["bar"]);
//! ```

pub use weave_di as di;

pub use crate::{
    binder::{Bindings, ChainLink, InterceptionPlan, MethodRef},
    catalog::TypeCatalog,
    config::DeploymentConfig,
    deployment::{Deployment, DeploymentBuilder},
    error::{DefinitionError, DeploymentError, DeploymentErrors},
    generator::GeneratedArtifact,
    model::{BeanDefinition, InjectionPoint, InterceptorDefinition},
    registry::BeanRegistry,
    resolver::{Resolution, ResolvedGraph},
};

pub mod binder;
pub mod catalog;
pub mod config;
pub mod deployment;
pub mod error;
pub mod generator;
pub mod model;
pub mod registry;
pub mod resolver;
