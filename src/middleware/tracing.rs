use std::time::Instant;

use tracing::{field, info, info_span, Span};

use super::{Completion, Flow, Middleware};
use crate::context::{RequestContext, ResponseSink};
use crate::handler::HandlerDescriptor;

/// Span and start time for one request, parked in the context extensions.
#[derive(Clone)]
struct RequestTrace {
    span: Span,
    start: Instant,
}

/// The `request` span of the current request, readable from the context
/// extensions between `pre` and `after`.
///
/// The dispatcher opens its `handler` span as a child of it, so binding,
/// handler and renderer events nest under the request.
#[derive(Debug, Clone)]
pub struct RequestSpan(pub Span);

/// Opens a `request` span in `pre` and closes it out in `after` with the
/// final status and latency.
///
/// The span is published as [`RequestSpan`]; middleware registered after this
/// one should enter it themselves if their own events belong under it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn pre(
        &self,
        ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        let span = info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            handler = %handler.name(),
            status = field::Empty,
            latency_us = field::Empty,
        );
        ctx.extensions_mut().insert(RequestSpan(span.clone()));
        ctx.extensions_mut().insert(RequestTrace {
            span,
            start: Instant::now(),
        });
        Ok(Flow::Continue)
    }

    fn after(
        &self,
        ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        completion: &Completion<'_>,
    ) -> anyhow::Result<()> {
        ctx.extensions_mut().remove::<RequestSpan>();
        let Some(trace) = ctx.extensions_mut().remove::<RequestTrace>() else {
            return Ok(());
        };
        let latency_us = trace.start.elapsed().as_micros() as u64;
        trace.span.record("status", completion.status.as_u16());
        trace.span.record("latency_us", latency_us);
        trace.span.in_scope(|| {
            info!(
                status = completion.status.as_u16(),
                latency_us,
                handler_invoked = completion.handler_invoked,
                error = completion.error.map(|e| e.kind()),
                "Request finished"
            );
        });
        Ok(())
    }
}
