use std::sync::Arc;

use tracing::info;

use super::core::DispatchCore;
use super::resolver::{DefaultErrorResolver, ErrorResolver};
use crate::binding::ParameterBinder;
use crate::config::DispatchConfig;
use crate::error::ConfigError;
use crate::handler::{Endpoint, HandlerDescriptor};
use crate::invoker::{AdapterSelector, Invoker};
use crate::middleware::{InterceptorPipeline, Middleware};
use crate::result::{JsonRenderer, Renderer, ResultDispatcher};
use crate::router::Router;

/// Collects routes, middleware and collaborators, then freezes them into a
/// [`DispatchCore`].
pub struct DispatchCoreBuilder {
    router: Router,
    pipeline: InterceptorPipeline,
    selector: AdapterSelector,
    renderer: Arc<dyn Renderer>,
    resolver: Option<Arc<dyn ErrorResolver>>,
    config: DispatchConfig,
}

impl Default for DispatchCoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchCoreBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            pipeline: InterceptorPipeline::new(),
            selector: AdapterSelector::default(),
            renderer: Arc::new(JsonRenderer),
            resolver: None,
            config: DispatchConfig::default(),
        }
    }

    /// Register a declarative route. `verb` of `""` or `"*"` matches any verb.
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn register(
        &mut self,
        pattern: &str,
        verb: &str,
        endpoint: Endpoint,
    ) -> Result<Arc<HandlerDescriptor>, ConfigError> {
        self.router.register(pattern, verb, endpoint)
    }

    /// Register a verb-agnostic legacy route.
    ///
    /// # Errors
    ///
    /// See [`Router::register_legacy`].
    pub fn register_legacy(
        &mut self,
        path: &str,
        endpoint: Endpoint,
    ) -> Result<Arc<HandlerDescriptor>, ConfigError> {
        self.router.register_legacy(path, endpoint)
    }

    /// Append a middleware; pre hooks run in the order they were added.
    pub fn register_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.pipeline.push(middleware);
    }

    #[must_use]
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_error_resolver(mut self, resolver: Arc<dyn ErrorResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Add an invoker ahead of the built-in ones.
    #[must_use]
    pub fn with_invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.selector.push_front(invoker);
        self
    }

    /// Replace the whole invoker list.
    #[must_use]
    pub fn with_selector(mut self, selector: AdapterSelector) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoInvoker`] if any registered handler has no
    /// supporting invoker.
    pub fn build(self) -> Result<DispatchCore, ConfigError> {
        if let Some(orphan) = self
            .router
            .descriptors()
            .find(|d| self.selector.select(d).is_none())
        {
            return Err(ConfigError::NoInvoker {
                handler: orphan.name().to_string(),
                shape: orphan.handler().shape(),
            });
        }

        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(DefaultErrorResolver::new(self.config.expose_error_details))
        });

        info!(
            routes = self.router.len(),
            middleware = ?self.pipeline.names(),
            renderer = %self.renderer.name(),
            invokers = self.selector.len(),
            expose_error_details = self.config.expose_error_details,
            slow_handler_ms = self.config.slow_handler_ms,
            "Dispatch core built"
        );

        Ok(DispatchCore {
            router: self.router,
            pipeline: self.pipeline,
            binder: ParameterBinder::new(),
            selector: self.selector,
            results: ResultDispatcher::new(self.renderer),
            resolver,
            config: self.config,
        })
    }
}

impl std::fmt::Debug for DispatchCoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCoreBuilder")
            .field("router", &self.router)
            .field("pipeline", &self.pipeline)
            .field("selector", &self.selector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
