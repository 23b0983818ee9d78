//! Interceptor Binder: computes the ordered interceptor chain of every intercepted method

use crate::{
    model::InterceptorDefinition,
    registry::BeanRegistry,
};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};

/// Identity of a bean method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MethodRef {
    /// Identity of the bean
    pub bean: String,
    /// Name of the method
    pub method: String,
}

impl MethodRef {
    /// Creates a method identity
    #[inline]
    pub fn new(bean: impl Into<String>, method: impl Into<String>) -> Self {
        Self { bean: bean.into(), method: method.into() }
    }
}

impl Display for MethodRef {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.bean, self.method)
    }
}

/// One interceptor in a chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChainLink {
    /// Identity of the interceptor
    pub interceptor: String,
    /// Reference to the callable behavior
    pub behavior: String,
    /// Declared priority
    pub priority: i32,
}

impl From<&InterceptorDefinition> for ChainLink {
    #[inline]
    fn from(interceptor: &InterceptorDefinition) -> Self {
        Self {
            interceptor: interceptor.id().to_owned(),
            behavior: interceptor.behavior().to_owned(),
            priority: interceptor.priority(),
        }
    }
}

/// The ordered interceptors of one method: the first wraps the second
/// and so on down to the method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptionPlan {
    method: MethodRef,
    chain: Vec<ChainLink>,
}

impl InterceptionPlan {
    /// The intercepted method
    #[inline]
    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    /// Interceptors in execution order
    #[inline]
    pub fn chain(&self) -> &[ChainLink] {
        &self.chain
    }

    /// Interceptor identities in execution order
    #[inline]
    pub fn interceptor_ids(&self) -> impl Iterator<Item = &str> {
        self.chain.iter().map(|link| link.interceptor.as_str())
    }
}

/// Every interception plan of a deployment
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bindings {
    plans: IndexMap<String, IndexMap<String, InterceptionPlan>>,
    unused: Vec<String>,
}

impl Bindings {
    /// Computes the plan of every method with a non-empty chain
    pub fn bind(registry: &BeanRegistry) -> Self {
        let interceptors: Vec<&InterceptorDefinition> = registry.interceptors().collect();
        let mut used = IndexSet::with_capacity(interceptors.len());
        let mut plans: IndexMap<String, IndexMap<String, InterceptionPlan>> = IndexMap::new();

        for bean in registry.beans() {
            for method in bean.methods() {
                let effective = bean.effective_bindings(method);
                if effective.is_empty() {
                    continue;
                }

                let mut chain: SmallVec<[&InterceptorDefinition; 8]> = interceptors
                    .iter()
                    .copied()
                    .filter(|interceptor| interceptor.matches(&effective))
                    .collect();
                if chain.is_empty() {
                    continue;
                }
                chain.sort_by_key(|interceptor| (interceptor.priority(), interceptor.order()));

                used.extend(chain.iter().map(|interceptor| interceptor.id()));
                let plan = InterceptionPlan {
                    method: MethodRef::new(bean.id(), method.name()),
                    chain: chain.into_iter().map(ChainLink::from).collect(),
                };
                plans
                    .entry(bean.id().to_owned())
                    .or_default()
                    .insert(method.name().to_owned(), plan);
            }
        }

        let unused: Vec<String> = interceptors
            .iter()
            .filter(|interceptor| !used.contains(interceptor.id()))
            .map(|interceptor| interceptor.id().to_owned())
            .collect();

        #[cfg(feature = "tracing")]
        for id in &unused {
            tracing::warn!(interceptor = %id, "interceptor does not apply to any method");
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            plans = plans.values().map(IndexMap::len).sum::<usize>(),
            unused = unused.len(),
            "interceptors bound"
        );

        Self { plans, unused }
    }

    /// The plan of a method, if it is intercepted
    #[inline]
    pub fn plan(&self, bean: &str, method: &str) -> Option<&InterceptionPlan> {
        self.plans
            .get(bean)
            .and_then(|methods| methods.get(method))
    }

    /// Plans of one bean, in method declaration order
    #[inline]
    pub fn plans_of(&self, bean: &str) -> impl Iterator<Item = &InterceptionPlan> {
        self.plans
            .get(bean)
            .into_iter()
            .flat_map(IndexMap::values)
    }

    /// Every plan, beans and methods in declaration order
    #[inline]
    pub fn plans(&self) -> impl Iterator<Item = &InterceptionPlan> {
        self.plans.values().flat_map(IndexMap::values)
    }

    /// Returns `true` if the bean has at least one intercepted method
    #[inline]
    pub fn is_intercepted(&self, bean: &str) -> bool {
        self.plans.get(bean).is_some_and(|methods| !methods.is_empty())
    }

    /// Identities of the interceptors that apply to no method
    #[inline]
    pub fn unused(&self) -> &[String] {
        &self.unused
    }
}
