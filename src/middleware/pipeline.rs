use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Completion, Flow, HookPhase, Middleware, MiddlewareError};
use crate::context::{RequestContext, ResponseSink};
use crate::error::panic_message;
use crate::handler::HandlerDescriptor;
use crate::result::DispatchResult;

/// Where one request is in the middleware chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    NotStarted,
    /// Pre hook of middleware `i` is running.
    RunningPre(usize),
    /// Every pre hook continued.
    Continue,
    /// A pre hook returned [`Flow::Stop`].
    ShortCircuit,
    /// A pre hook failed.
    PreFailed,
    HandlerInvoked,
    RunningPost,
    RunningAfter,
    Done,
}

/// Per-request pipeline bookkeeping.
///
/// `admitted` is the number of middleware whose pre hook finished by
/// continuing or stopping. Post and after only ever touch `[0, admitted)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineState {
    phase: PipelinePhase,
    admitted: usize,
    handler_invoked: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: PipelinePhase::NotStarted,
            admitted: 0,
            handler_invoked: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    #[must_use]
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    #[must_use]
    pub fn handler_invoked(&self) -> bool {
        self.handler_invoked
    }

    /// Record that the handler is about to run. Only valid after every pre
    /// hook continued; returns `false` otherwise.
    pub fn mark_handler_invoked(&mut self) -> bool {
        if self.phase != PipelinePhase::Continue {
            return false;
        }
        self.phase = PipelinePhase::HandlerInvoked;
        self.handler_invoked = true;
        true
    }
}

/// Result of the pre phase.
#[derive(Debug)]
pub enum PreOutcome {
    /// Invoke the handler.
    Continue,
    /// Middleware `index` stopped the chain.
    ShortCircuit { index: usize },
    /// A pre hook failed; the error goes back to the caller after cleanup.
    Failed(MiddlewareError),
}

/// Ordered, append-only middleware chain.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl InterceptorPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Middleware names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run pre hooks in registration order until one stops or fails.
    pub fn run_pre(
        &self,
        state: &mut PipelineState,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        handler: &HandlerDescriptor,
    ) -> PreOutcome {
        if state.phase != PipelinePhase::NotStarted {
            warn!(phase = ?state.phase, "Pre phase requested twice, ignoring");
            return PreOutcome::Failed(MiddlewareError {
                middleware: "pipeline",
                index: state.admitted,
                phase: HookPhase::Pre,
                source: anyhow::anyhow!("pre phase already ran for this request"),
            });
        }

        for (index, mw) in self.middlewares.iter().enumerate() {
            state.phase = PipelinePhase::RunningPre(index);
            let outcome = catch_unwind(AssertUnwindSafe(|| mw.pre(ctx, res, handler)));
            match outcome {
                Ok(Ok(Flow::Continue)) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        middleware = mw.name(),
                        middleware_idx = index,
                        "Middleware pre continued"
                    );
                }
                Ok(Ok(Flow::Stop)) => {
                    state.admitted = index + 1;
                    state.phase = PipelinePhase::ShortCircuit;
                    debug!(
                        request_id = %ctx.request_id(),
                        middleware = mw.name(),
                        middleware_idx = index,
                        handler_name = %handler.name(),
                        "Middleware short-circuited the request"
                    );
                    return PreOutcome::ShortCircuit { index };
                }
                Ok(Err(source)) => {
                    state.admitted = index;
                    state.phase = PipelinePhase::PreFailed;
                    return PreOutcome::Failed(MiddlewareError {
                        middleware: mw.name(),
                        index,
                        phase: HookPhase::Pre,
                        source,
                    });
                }
                Err(payload) => {
                    state.admitted = index;
                    state.phase = PipelinePhase::PreFailed;
                    let message = panic_message(payload.as_ref());
                    return PreOutcome::Failed(MiddlewareError {
                        middleware: mw.name(),
                        index,
                        phase: HookPhase::Pre,
                        source: anyhow::anyhow!("panicked: {message}"),
                    });
                }
            }
        }

        state.admitted = self.middlewares.len();
        state.phase = PipelinePhase::Continue;
        PreOutcome::Continue
    }

    /// Run post hooks over the admitted middleware in reverse order.
    ///
    /// Does nothing unless the handler was invoked. Failures are logged and
    /// the remaining hooks still run.
    pub fn run_post(
        &self,
        state: &mut PipelineState,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        handler: &HandlerDescriptor,
        result: &mut DispatchResult,
    ) {
        if !state.handler_invoked || state.phase != PipelinePhase::HandlerInvoked {
            return;
        }
        state.phase = PipelinePhase::RunningPost;

        for index in (0..state.admitted).rev() {
            let mw = &self.middlewares[index];
            let outcome = catch_unwind(AssertUnwindSafe(|| mw.post(ctx, res, handler, result)));
            if let Some(err) = swallowed(outcome, mw.name(), index, HookPhase::Post) {
                warn!(
                    request_id = %ctx.request_id(),
                    handler_name = %handler.name(),
                    middleware = err.middleware,
                    middleware_idx = index,
                    error = %err,
                    "Middleware post hook failed, continuing"
                );
            }
        }
    }

    /// Run after hooks over the admitted middleware in reverse order.
    ///
    /// Runs at most once per state. Failures are logged, never returned.
    pub fn run_after(
        &self,
        state: &mut PipelineState,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        completion: &Completion<'_>,
    ) {
        if matches!(state.phase, PipelinePhase::Done | PipelinePhase::RunningAfter) {
            debug!(request_id = %ctx.request_id(), "After phase already ran");
            return;
        }
        state.phase = PipelinePhase::RunningAfter;

        for index in (0..state.admitted).rev() {
            let mw = &self.middlewares[index];
            let outcome = catch_unwind(AssertUnwindSafe(|| mw.after(ctx, res, completion)));
            if let Some(err) = swallowed(outcome, mw.name(), index, HookPhase::After) {
                warn!(
                    request_id = %ctx.request_id(),
                    handler_name = %completion.handler.name(),
                    middleware = err.middleware,
                    middleware_idx = index,
                    error = %err,
                    "Middleware after hook failed, continuing"
                );
            }
        }

        state.phase = PipelinePhase::Done;
    }
}

impl std::fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("middlewares", &self.names())
            .finish()
    }
}

fn swallowed(
    outcome: std::thread::Result<anyhow::Result<()>>,
    middleware: &'static str,
    index: usize,
    phase: HookPhase,
) -> Option<MiddlewareError> {
    let source = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => e,
        Err(payload) => anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())),
    };
    Some(MiddlewareError {
        middleware,
        index,
        phase,
        source,
    })
}
