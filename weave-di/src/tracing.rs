//! Tools for tracing bean method invocations

use serde::Deserialize;
use tracing::trace_span;
use crate::{
    ContainerBuilder,
    error::{Error, Key},
    invocation::{Interceptor, InvocationContext, Value}
};

/// Represents a tracing configuration of the [`TracingInterceptor`]
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Specifies whether a failed invocation is reported with a warning
    ///
    /// Default: `true`
    record_failures: bool,

    /// Specifies whether the number of arguments is recorded
    ///
    /// Default: `false`
    record_arguments: bool,
}

impl Default for TracingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            record_failures: true,
            record_arguments: false,
        }
    }
}

impl TracingConfig {
    /// Creates a default tracing configuration
    ///
    /// Defaults:
    /// - record_failures: `true`
    /// - record_arguments: `false`
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures tracing to record the number of arguments of each invocation
    ///
    /// Default: `false`
    pub fn with_arguments(mut self) -> Self {
        self.record_arguments = true;
        self
    }

    /// Configures tracing to stay silent about failed invocations
    ///
    /// Default: failures are recorded
    pub fn without_failures(mut self) -> Self {
        self.record_failures = false;
        self
    }
}

/// An interceptor that wraps each invocation into a [`tracing::Span`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor {
    config: TracingConfig
}

impl TracingInterceptor {
    /// Creates a tracing interceptor with specific configuration
    #[inline]
    pub fn new(config: TracingConfig) -> Self {
        Self { config }
    }
}

impl Interceptor for TracingInterceptor {
    fn invoke(&self, ctx: &mut InvocationContext) -> Result<Value, Error> {
        let span = trace_span!("invocation", bean = %ctx.bean(), method = %ctx.method());
        let _entered = span.enter();

        if self.config.record_arguments {
            tracing::trace!(arguments = ctx.args().len(), "invoking");
        }

        let result = ctx.proceed();
        if self.config.record_failures && let Err(err) = &result {
            tracing::warn!(error = %err, "invocation failed");
        }
        result
    }
}

impl ContainerBuilder {
    /// Registers the [`TracingInterceptor`] under the given behavior reference
    /// with the default configuration
    ///
    /// Defaults:
    /// - record_failures: `true`
    /// - record_arguments: `false`
    pub fn use_tracing(&mut self, behavior: impl Into<Key>) -> &mut Self {
        self.with_tracing(behavior, |config| config)
    }

    /// Registers the [`TracingInterceptor`] under the given behavior reference
    /// with specific configuration
    ///
    /// # Example
    /// ```no_run
    /// use weave_di::ContainerBuilder;
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.with_tracing("tracing", |config| config.with_arguments());
    /// ```
    pub fn with_tracing<T>(&mut self, behavior: impl Into<Key>, config: T) -> &mut Self
    where
        T: FnOnce(TracingConfig) -> TracingConfig
    {
        let interceptor = TracingInterceptor::new(config(TracingConfig::default()));
        self.interceptor(behavior, move || interceptor)
    }
}
