use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::StatusCode;

use super::{Completion, Flow, Middleware};
use crate::context::{RequestContext, ResponseSink};
use crate::handler::HandlerDescriptor;

#[derive(Clone, Copy)]
struct MetricsStart(Instant);

/// Per-handler counters.
#[derive(Debug, Default)]
pub struct HandlerStats {
    requests: AtomicUsize,
    errors: AtomicUsize,
    total_latency_ns: AtomicU64,
}

impl HandlerStats {
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn average_latency(&self) -> Duration {
        average(&self.total_latency_ns, self.requests())
    }
}

/// Middleware for collecting request counters
///
/// Tracks request counts, latency, short-circuits, errors and authentication
/// failures. All counters use atomic operations for thread-safe updates
/// without locks; per-handler counters live in a `DashMap` keyed by handler
/// name.
///
/// The start time is kept in the request's extensions, so one instance is
/// safe to share across concurrent dispatches.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    completed: AtomicUsize,
    short_circuits: AtomicUsize,
    error_count: AtomicUsize,
    auth_failures: AtomicUsize,
    total_latency_ns: AtomicU64,
    per_handler: DashMap<Arc<str>, HandlerStats>,
}

impl MetricsMiddleware {
    /// Create a new metrics middleware with all counters initialized to zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests that entered the middleware
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Requests whose after hook ran.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Requests that finished without reaching the handler.
    #[must_use]
    pub fn short_circuit_count(&self) -> usize {
        self.short_circuits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Get the total number of `401 Unauthorized` responses
    #[must_use]
    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }

    /// Calculate the average request latency
    ///
    /// Returns zero duration if no requests have completed yet.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        average(&self.total_latency_ns, self.completed_count())
    }

    /// Snapshot of `(requests, errors)` for one handler.
    #[must_use]
    pub fn handler_counts(&self, handler: &str) -> Option<(usize, usize)> {
        self.per_handler
            .get(handler)
            .map(|s| (s.requests(), s.errors()))
    }

    /// Average latency for one handler.
    #[must_use]
    pub fn handler_latency(&self, handler: &str) -> Option<Duration> {
        self.per_handler.get(handler).map(|s| s.average_latency())
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn pre(
        &self,
        ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        _handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        ctx.extensions_mut().insert(MetricsStart(Instant::now()));
        Ok(Flow::Continue)
    }

    fn after(
        &self,
        ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        completion: &Completion<'_>,
    ) -> anyhow::Result<()> {
        let latency_ns = ctx
            .extensions_mut()
            .remove::<MetricsStart>()
            .map_or(0, |MetricsStart(start)| start.elapsed().as_nanos() as u64);

        self.completed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
        if !completion.handler_invoked {
            self.short_circuits.fetch_add(1, Ordering::Relaxed);
        }
        let failed = completion.error.is_some() || completion.status.is_server_error();
        if failed {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if completion.status == StatusCode::UNAUTHORIZED {
            self.auth_failures.fetch_add(1, Ordering::Relaxed);
        }

        let stats = self
            .per_handler
            .entry(completion.handler.shared_name())
            .or_default();
        stats.requests.fetch_add(1, Ordering::Relaxed);
        stats.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
        if failed {
            stats.errors.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

fn average(total_ns: &AtomicU64, count: usize) -> Duration {
    if count == 0 {
        Duration::from_nanos(0)
    } else {
        Duration::from_nanos(total_ns.load(Ordering::Relaxed) / count as u64)
    }
}
