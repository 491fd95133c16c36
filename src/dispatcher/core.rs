use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode};
use tracing::{debug, error, info, info_span, warn, Span};

use super::builder::DispatchCoreBuilder;
use super::resolver::ErrorResolver;
use crate::binding::ParameterBinder;
use crate::config::DispatchConfig;
use crate::context::{RequestContext, RequestContextBuilder, ResponseSink};
use crate::error::{panic_message, DispatchError};
use crate::handler::HandlerDescriptor;
use crate::invoker::AdapterSelector;
use crate::middleware::{Completion, InterceptorPipeline, PipelineState, PreOutcome, RequestSpan};
use crate::result::ResultDispatcher;
use crate::router::{LookupError, Router};

/// What a single [`DispatchCore::dispatch`] call produced.
///
/// The response itself has already been written to the sink; this is the
/// summary the embedding shell can log or act on.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Final status on the sink.
    pub status: StatusCode,
    /// Set for every failed dispatch, resolved or not.
    pub error: Option<DispatchError>,
    /// Matched handler, `None` on a routing miss or method mismatch.
    pub handler: Option<Arc<str>>,
    pub handler_invoked: bool,
}

impl DispatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Owns the routing table, middleware chain, invokers and renderer.
///
/// Built once by [`DispatchCoreBuilder`] and immutable afterwards, so one
/// instance can serve any number of threads through a shared reference.
pub struct DispatchCore {
    pub(super) router: Router,
    pub(super) pipeline: InterceptorPipeline,
    pub(super) binder: ParameterBinder,
    pub(super) selector: AdapterSelector,
    pub(super) results: ResultDispatcher,
    pub(super) resolver: Arc<dyn ErrorResolver>,
    pub(super) config: DispatchConfig,
}

impl DispatchCore {
    #[must_use]
    pub fn builder() -> DispatchCoreBuilder {
        DispatchCoreBuilder::new()
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn pipeline(&self) -> &InterceptorPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Start a [`RequestContext`] that honours this core's configuration,
    /// e.g. reading the request id from `request_id_header`.
    #[must_use]
    pub fn context_builder(&self, method: Method, target: &str) -> RequestContextBuilder {
        RequestContext::builder(method, target).with_config(&self.config)
    }

    /// Run one request through lookup, middleware, handler and renderer.
    ///
    /// Never panics on behalf of user code and never returns early without
    /// running the after hooks of every admitted middleware.
    pub fn dispatch(
        &self,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
    ) -> DispatchOutcome {
        let start = Instant::now();

        let route = match self.router.lookup(ctx.path(), ctx.method()) {
            Ok(route) => route,
            Err(miss) => {
                let error = match miss {
                    LookupError::Miss => DispatchError::RoutingMiss {
                        method: ctx.method().clone(),
                        path: ctx.path().to_string(),
                    },
                    LookupError::MethodMismatch { allowed } => DispatchError::MethodMismatch {
                        path: ctx.path().to_string(),
                        method: ctx.method().clone(),
                        allowed,
                    },
                };
                self.resolve(&error, ctx, res);
                let outcome = DispatchOutcome {
                    status: res.status(),
                    error: Some(error),
                    handler: None,
                    handler_invoked: false,
                };
                log_completion(ctx, &outcome, start);
                return outcome;
            }
        };
        let descriptor = route.descriptor;

        let mut state = PipelineState::new();
        let error = match self.pipeline.run_pre(&mut state, ctx, res, &descriptor) {
            PreOutcome::Continue => {
                let span = handler_span(ctx, &descriptor);
                span.in_scope(|| self.run_handler(&mut state, &descriptor, ctx, res))
                    .err()
            }
            PreOutcome::ShortCircuit { .. } => None,
            PreOutcome::Failed(err) => {
                error!(
                    request_id = %ctx.request_id(),
                    handler_name = %descriptor.name(),
                    middleware = err.middleware,
                    middleware_idx = err.index,
                    error = %err,
                    "Middleware pre hook failed, request aborted"
                );
                Some(DispatchError::Middleware(err))
            }
        };

        if let Some(err) = &error {
            if err.is_resolvable() {
                self.resolve(err, ctx, res);
            } else {
                if !res.is_committed() {
                    res.reset();
                }
                res.set_status(err.status());
            }
        }

        let status = res.status();
        let completion = Completion {
            handler: &descriptor,
            handler_invoked: state.handler_invoked(),
            status,
            error: error.as_ref(),
        };
        self.pipeline.run_after(&mut state, ctx, res, &completion);

        let outcome = DispatchOutcome {
            status,
            error,
            handler: Some(descriptor.shared_name()),
            handler_invoked: state.handler_invoked(),
        };
        log_completion(ctx, &outcome, start);
        outcome
    }

    fn run_handler(
        &self,
        state: &mut PipelineState,
        descriptor: &HandlerDescriptor,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
    ) -> Result<(), DispatchError> {
        let args = self.binder.bind(descriptor, ctx)?;
        state.mark_handler_invoked();

        let started = Instant::now();
        let raw = self.selector.invoke(descriptor, args, ctx, res);
        let elapsed = started.elapsed();
        if elapsed > self.config.slow_handler_threshold() {
            warn!(
                request_id = %ctx.request_id(),
                handler_name = %descriptor.name(),
                latency_us = elapsed.as_micros(),
                threshold_ms = self.config.slow_handler_ms,
                "Slow handler"
            );
        }

        let mut result = self.results.normalize(raw?)?;
        self.pipeline
            .run_post(state, ctx, res, descriptor, &mut result);
        self.results.render(&result, ctx, res)?;
        Ok(())
    }

    fn resolve(&self, error: &DispatchError, ctx: &RequestContext, res: &mut dyn ResponseSink) {
        debug!(
            request_id = %ctx.request_id(),
            kind = error.kind(),
            status = error.status().as_u16(),
            "Resolving dispatch error"
        );
        let outcome = catch_unwind(AssertUnwindSafe(|| self.resolver.resolve(error, ctx, res)));
        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        error!(
            request_id = %ctx.request_id(),
            kind = error.kind(),
            failure = %failure,
            "Error resolver failed, falling back to bare status"
        );
        if !res.is_committed() {
            res.reset();
        }
        res.set_status(error.status());
    }
}

impl std::fmt::Debug for DispatchCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCore")
            .field("router", &self.router)
            .field("pipeline", &self.pipeline)
            .field("selector", &self.selector)
            .field("results", &self.results)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Span covering binding, invocation, post hooks and rendering. Nested under
/// the request span when a [`TracingMiddleware`](crate::middleware::TracingMiddleware)
/// published one.
fn handler_span(ctx: &RequestContext, descriptor: &HandlerDescriptor) -> Span {
    let parent = ctx
        .extensions()
        .get::<RequestSpan>()
        .and_then(|s| s.0.id())
        .or_else(|| Span::current().id());
    info_span!(
        parent: parent,
        "handler",
        request_id = %ctx.request_id(),
        handler_name = %descriptor.name(),
    )
}

fn log_completion(ctx: &RequestContext, outcome: &DispatchOutcome, start: Instant) {
    let latency_us = start.elapsed().as_micros();
    let handler = outcome.handler.as_deref().unwrap_or("-");
    if outcome.status.is_server_error() {
        error!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            handler_name = %handler,
            status = outcome.status.as_u16(),
            error = ?outcome.error.as_ref().map(ToString::to_string),
            latency_us,
            "Dispatch failed"
        );
    } else {
        info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            handler_name = %handler,
            status = outcome.status.as_u16(),
            handler_invoked = outcome.handler_invoked,
            latency_us,
            "Dispatch complete"
        );
    }
}
