//! Deployment configuration

use indexmap::IndexSet;
use serde::Deserialize;

#[cfg(feature = "tracing")]
use weave_di::tracing::TracingConfig;

/// Behavior reference under which the built-in tracing interceptor is registered
#[cfg(feature = "tracing")]
pub const TRACING_BEHAVIOR: &str = "weave.tracing";

/// Represents a deployment configuration
///
/// # Example
/// ```no_run
/// use weave::config::DeploymentConfig;
///
/// let config = DeploymentConfig::new()
///     .exclude("legacy-mailer")
///     .exclude_type("MockGateway");
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Identities of beans and interceptors left out of the deployment
    exclude: IndexSet<String>,

    /// Types whose beans are left out of the deployment
    exclude_type: IndexSet<String>,

    /// Configuration of the built-in tracing interceptor, if enabled
    #[cfg(feature = "tracing")]
    tracing: Option<TracingConfig>,
}

impl DeploymentConfig {
    /// Creates a default configuration that excludes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves a bean or an interceptor out of the deployment
    pub fn exclude(mut self, id: impl Into<String>) -> Self {
        self.exclude.insert(id.into());
        self
    }

    /// Leaves every bean assignable to `type_name` out of the deployment
    pub fn exclude_type(mut self, type_name: impl Into<String>) -> Self {
        self.exclude_type.insert(type_name.into());
        self
    }

    /// Registers the built-in tracing interceptor under [`TRACING_BEHAVIOR`]
    /// in every container builder created from the deployment
    ///
    /// Defaults:
    /// - record_failures: `true`
    /// - record_arguments: `false`
    #[cfg(feature = "tracing")]
    pub fn with_tracing<T>(mut self, config: T) -> Self
    where
        T: FnOnce(TracingConfig) -> TracingConfig
    {
        self.tracing = Some(config(self.tracing.unwrap_or_default()));
        self
    }

    /// Returns `true` if the identity is excluded
    #[inline]
    pub fn is_excluded(&self, id: &str) -> bool {
        self.exclude.contains(id)
    }

    /// Returns `true` if any of the types is excluded
    #[inline]
    pub fn is_type_excluded<'a>(&self, mut types: impl Iterator<Item = &'a str>) -> bool {
        types.any(|ty| self.exclude_type.contains(ty))
    }

    /// Configuration of the built-in tracing interceptor
    #[inline]
    #[cfg(feature = "tracing")]
    pub fn tracing(&self) -> Option<TracingConfig> {
        self.tracing
    }
}
