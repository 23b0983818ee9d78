//! Deployment pipeline: registry, resolver, binder and generator run in order

use crate::{
    binder::{Bindings, InterceptionPlan},
    catalog::TypeCatalog,
    config::DeploymentConfig,
    error::DeploymentErrors,
    generator::{self, GeneratedArtifact, IndirectionRecord},
    registry::BeanRegistry,
    resolver::ResolvedGraph,
};
use indexmap::IndexSet;
use weave_di::ContainerBuilder;

#[cfg(feature = "tracing")]
use crate::config::TRACING_BEHAVIOR;

/// Builds a [`Deployment`] with specific configuration
#[derive(Debug, Default)]
pub struct DeploymentBuilder {
    config: DeploymentConfig,
}

impl DeploymentBuilder {
    /// Creates a builder with the default configuration
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the deployment
    ///
    /// # Example
    /// ```no_run
    /// use weave::{Deployment, catalog::TypeCatalog};
    ///
    /// let catalog = TypeCatalog::default();
    /// let deployment = Deployment::builder()
    ///     .with_config(|config| config.exclude("legacy-mailer"))
    ///     .deploy(&catalog);
    /// ```
    pub fn with_config<T>(mut self, config: T) -> Self
    where
        T: FnOnce(DeploymentConfig) -> DeploymentConfig
    {
        self.config = config(self.config);
        self
    }

    /// Replaces the configuration
    #[inline]
    pub fn set_config(mut self, config: DeploymentConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every build phase over the catalog.
    ///
    /// Definition errors abort before resolution; resolution errors are
    /// collected across the whole graph and reported together.
    pub fn deploy(self, catalog: &TypeCatalog) -> Result<Deployment, DeploymentErrors> {
        #[cfg(feature = "tracing")]
        tracing::debug!(entries = catalog.len(), "deployment started");

        let registry = BeanRegistry::register_with(catalog, &self.config)?;
        let graph = ResolvedGraph::resolve(&registry);
        graph.validate()?;

        let bindings = Bindings::bind(&registry);
        let artifacts = generator::generate_all(&registry, &bindings);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            beans = registry.beans().len(),
            interceptors = registry.interceptors().len(),
            artifacts = artifacts.len(),
            "deployment validated"
        );

        Ok(Deployment {
            config: self.config,
            registry,
            graph,
            bindings,
            artifacts,
        })
    }
}

/// A validated deployment: the immutable result of every build phase
#[derive(Debug, Clone)]
pub struct Deployment {
    config: DeploymentConfig,
    registry: BeanRegistry,
    graph: ResolvedGraph,
    bindings: Bindings,
    artifacts: Vec<GeneratedArtifact>,
}

impl Deployment {
    /// Creates a deployment builder
    #[inline]
    pub fn builder() -> DeploymentBuilder {
        DeploymentBuilder::new()
    }

    /// Deploys a catalog with the default configuration
    #[inline]
    pub fn deploy(catalog: &TypeCatalog) -> Result<Self, DeploymentErrors> {
        DeploymentBuilder::new().deploy(catalog)
    }

    /// The configuration the deployment was built with
    #[inline]
    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// The validated beans and interceptors
    #[inline]
    pub fn registry(&self) -> &BeanRegistry {
        &self.registry
    }

    /// Resolution of every injection point
    #[inline]
    pub fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    /// Every interception plan
    #[inline]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// The interception plan of a method, if it is intercepted
    #[inline]
    pub fn plan(&self, bean: &str, method: &str) -> Option<&InterceptionPlan> {
        self.bindings.plan(bean, method)
    }

    /// Every generated artifact in bean declaration order
    #[inline]
    pub fn artifacts(&self) -> &[GeneratedArtifact] {
        &self.artifacts
    }

    /// Returns an artifact by the name of the generated type
    #[inline]
    pub fn artifact(&self, name: &str) -> Option<&GeneratedArtifact> {
        self.artifacts.iter().find(|artifact| artifact.name() == name)
    }

    /// The indirection record of a contextual bean
    #[inline]
    pub fn indirection(&self, bean: &str) -> Option<IndirectionRecord> {
        self.registry.bean(bean).and_then(generator::indirection)
    }

    /// Creates a container builder that carries the deployment's wiring.
    ///
    /// Every bean is declared with its scope, its resolved dependencies and
    /// its methods; every interceptor used by a plan is declared with its
    /// behavior; every plan becomes a chain. What remains is registering
    /// the factories, method bodies and behaviors.
    pub fn container_builder(&self) -> ContainerBuilder {
        let mut builder = ContainerBuilder::new();

        for bean in self.registry.beans() {
            builder.declare_bean(bean.id(), bean.scope(), self.graph.targets(bean.dependencies()));
            for method in bean.methods() {
                builder.declare_method(bean.id(), method.name());
            }
        }

        let used: IndexSet<&str> = self.bindings
            .plans()
            .flat_map(|plan| plan.interceptor_ids())
            .collect();
        for interceptor in self.registry.interceptors().filter(|i| used.contains(i.id())) {
            builder.declare_interceptor(
                interceptor.id(),
                interceptor.behavior(),
                self.graph.targets(interceptor.dependencies()));
        }

        for plan in self.bindings.plans() {
            let method = plan.method();
            builder.declare_chain(method.bean.as_str(), method.method.as_str(), plan.interceptor_ids());
        }

        #[cfg(feature = "tracing")]
        if let Some(config) = self.config.tracing() {
            builder.with_tracing(TRACING_BEHAVIOR, move |_| config);
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::Deployment;
    use crate::catalog::{BeanDescriptor, InterceptorDescriptor, MarkerDescriptor, MethodDescriptor, TypeCatalog};
    use weave_di::{InvocationContext, args, value};

    struct Clock;

    struct Greeter {
        clock: Arc<Clock>
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::builder()
            .bean(BeanDescriptor::new("clock", "Clock").scope("singleton"))
            .bean(BeanDescriptor::new("greeter", "Greeter")
                .inject("Clock")
                .method(MethodDescriptor::new("greet").binding(MarkerDescriptor::new("Shouted"))))
            .interceptor(InterceptorDescriptor::new("shout", "uppercase").binding(MarkerDescriptor::new("Shouted")))
            .interceptor(InterceptorDescriptor::new("idle", "noop").binding(MarkerDescriptor::new("Unused")))
            .build()
    }

    #[test]
    fn it_deploys_catalog() {
        let deployment = Deployment::deploy(&catalog()).unwrap();

        assert_eq!(deployment.registry().beans().len(), 2);
        assert_eq!(deployment.plan("greeter", "greet").unwrap().chain().len(), 1);
        assert_eq!(deployment.bindings().unused(), ["idle"]);
        assert!(deployment.artifact("greeter_Subclass").is_some());
        assert!(deployment.indirection("greeter").is_none());
    }

    #[test]
    fn it_fails_with_every_resolution_error() {
        let catalog = TypeCatalog::builder()
            .bean(BeanDescriptor::new("a", "A").inject("Missing"))
            .bean(BeanDescriptor::new("b", "B").inject("AlsoMissing"))
            .build();

        let errors = Deployment::deploy(&catalog).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|err| err.is_unsatisfied()));
    }

    #[test]
    fn it_applies_config() {
        let deployment = Deployment::builder()
            .with_config(|config| config.exclude("idle"))
            .deploy(&catalog())
            .unwrap();

        assert!(deployment.bindings().unused().is_empty());
        assert!(deployment.config().is_excluded("idle"));
    }

    #[test]
    fn it_wires_container_from_deployment() {
        let deployment = Deployment::deploy(&catalog()).unwrap();

        let mut builder = deployment.container_builder();
        builder
            .factory("clock", || Clock)
            .factory("greeter", |clock: Arc<Clock>| Ok(Greeter { clock }))
            .method("greeter", "greet", |greeter: &Greeter, args| {
                let _ = &greeter.clock;
                let name = args.get::<String>(0)?;
                Ok(value(format!("hello, {name}")))
            })
            .interceptor_fn("uppercase", |ctx: &mut InvocationContext| {
                let result = ctx.proceed()?;
                let text = result
                    .downcast_ref::<String>()
                    .map(|s| s.to_uppercase())
                    .unwrap_or_default();
                Ok(value(text))
            });

        let container = builder.build().unwrap();

        let result = container.invoke("greeter", "greet", args![String::from("ann")]).unwrap();

        assert_eq!(result.downcast_ref::<String>().unwrap(), "HELLO, ANN");
        assert_eq!(container.dispatch_table().chain_of("greeter", "greet").len(), 1);
    }
}
