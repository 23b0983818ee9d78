//! Proxy/Subclass Generator: describes the wrapper types a code emitter has to produce
//!
//! Artifacts are plain data and carry no reference back into the registry,
//! so they can be serialized and handed to any backend.

use crate::{
    binder::{Bindings, ChainLink},
    model::BeanDefinition,
    registry::BeanRegistry,
};
use serde::Serialize;
use smallvec::SmallVec;
use weave_di::Scope;

const SUBCLASS_SUFFIX: &str = "_Subclass";
const CLIENT_PROXY_SUFFIX: &str = "_ClientProxy";

/// A method routed through its interceptor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptedMethod {
    /// Name of the method
    pub name: String,
    /// Interceptors in execution order
    pub chain: Vec<ChainLink>,
}

/// Wrapper of a bean with at least one intercepted method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubclassArtifact {
    /// Name of the generated type
    pub name: String,
    /// Identity of the wrapped bean
    pub bean: String,
    /// Implementation type of the wrapped bean
    pub bean_type: String,
    /// Intercepted methods in declaration order
    pub intercepted: Vec<InterceptedMethod>,
    /// Methods forwarded directly to the body, in declaration order
    pub pass_through: Vec<String>,
}

/// What a client proxy does when no context is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingContextPolicy {
    /// The call fails with a resolution error
    Fail,
}

/// Key under which the current-context instance is looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextLookupKey {
    /// Scope that owns the instance
    pub scope: Scope,
    /// Identity of the bean
    pub bean: String,
}

/// How a client proxy finds its delegate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndirectionRecord {
    /// Where the delegate is looked up
    pub lookup: ContextLookupKey,
    /// What happens when there is no active context
    pub on_missing: MissingContextPolicy,
}

/// Wrapper of a contextual bean that looks up the current-context instance on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientProxyArtifact {
    /// Name of the generated type
    pub name: String,
    /// Identity of the wrapped bean
    pub bean: String,
    /// Implementation type of the wrapped bean
    pub bean_type: String,
    /// Forwarded methods in declaration order
    pub methods: Vec<String>,
    /// How the delegate is found
    pub indirection: IndirectionRecord,
}

/// Description of one wrapper type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratedArtifact {
    /// Wrapper that runs interceptor chains
    Subclass(SubclassArtifact),
    /// Wrapper that defers to the current-context instance
    ClientProxy(ClientProxyArtifact),
}

impl GeneratedArtifact {
    /// Name of the generated type
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            GeneratedArtifact::Subclass(artifact) => &artifact.name,
            GeneratedArtifact::ClientProxy(artifact) => &artifact.name,
        }
    }

    /// Identity of the wrapped bean
    #[inline]
    pub fn bean(&self) -> &str {
        match self {
            GeneratedArtifact::Subclass(artifact) => &artifact.bean,
            GeneratedArtifact::ClientProxy(artifact) => &artifact.bean,
        }
    }

    /// Returns the subclass description, if this is one
    #[inline]
    pub fn as_subclass(&self) -> Option<&SubclassArtifact> {
        match self {
            GeneratedArtifact::Subclass(artifact) => Some(artifact),
            _ => None
        }
    }

    /// Returns the client proxy description, if this is one
    #[inline]
    pub fn as_client_proxy(&self) -> Option<&ClientProxyArtifact> {
        match self {
            GeneratedArtifact::ClientProxy(artifact) => Some(artifact),
            _ => None
        }
    }
}

/// The indirection record of a contextual bean
#[inline]
pub fn indirection(bean: &BeanDefinition) -> Option<IndirectionRecord> {
    bean.scope().is_contextual().then(|| IndirectionRecord {
        lookup: ContextLookupKey {
            scope: bean.scope(),
            bean: bean.id().to_owned()
        },
        on_missing: MissingContextPolicy::Fail,
    })
}

/// Describes the wrappers one bean needs: a subclass if any method is intercepted,
/// a client proxy if it is contextual, both or none
pub fn generate(bean: &BeanDefinition, bindings: &Bindings) -> SmallVec<[GeneratedArtifact; 2]> {
    let mut artifacts = SmallVec::new();

    if bindings.is_intercepted(bean.id()) {
        let mut intercepted = Vec::new();
        let mut pass_through = Vec::new();
        for method in bean.methods() {
            match bindings.plan(bean.id(), method.name()) {
                Some(plan) => intercepted.push(InterceptedMethod {
                    name: method.name().to_owned(),
                    chain: plan.chain().to_vec(),
                }),
                None => pass_through.push(method.name().to_owned()),
            }
        }
        artifacts.push(GeneratedArtifact::Subclass(SubclassArtifact {
            name: format!("{}{SUBCLASS_SUFFIX}", bean.id()),
            bean: bean.id().to_owned(),
            bean_type: bean.type_name().to_owned(),
            intercepted,
            pass_through,
        }));
    }

    if let Some(indirection) = indirection(bean) {
        artifacts.push(GeneratedArtifact::ClientProxy(ClientProxyArtifact {
            name: format!("{}{CLIENT_PROXY_SUFFIX}", bean.id()),
            bean: bean.id().to_owned(),
            bean_type: bean.type_name().to_owned(),
            methods: bean.methods().iter().map(|method| method.name().to_owned()).collect(),
            indirection,
        }));
    }

    artifacts
}

/// Describes the wrappers of every bean in declaration order
pub fn generate_all(registry: &BeanRegistry, bindings: &Bindings) -> Vec<GeneratedArtifact> {
    let artifacts: Vec<GeneratedArtifact> = registry
        .beans()
        .flat_map(|bean| generate(bean, bindings))
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(artifacts = artifacts.len(), "artifacts generated");

    artifacts
}
