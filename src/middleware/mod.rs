//! # Middleware Module
//!
//! Ordered hooks around every handler invocation.
//!
//! Each [`Middleware`] gets three chances to act on a request: `pre` before
//! the handler (may stop the chain), `post` after a successful handler (may
//! edit the result) and `after` once everything is done, including
//! rendering and error resolution. [`InterceptorPipeline`] runs the chain;
//! if `k` middleware finished `pre`, exactly those `k` see `post` and
//! `after`, newest first.
//!
//! Built-in middleware:
//!
//! - [`TracingMiddleware`]: request span with status and latency
//! - [`MetricsMiddleware`]: atomic request, error and latency counters
//! - [`AuthMiddleware`]: static token check, `401` and stop on mismatch
//! - [`CorsMiddleware`]: origin checks and preflight answers

mod auth;
mod core;
mod cors;
mod metrics;
mod pipeline;
mod tracing;

pub use auth::AuthMiddleware;
pub use core::{Completion, Flow, HookPhase, Middleware, MiddlewareError};
pub use cors::{CorsConfigError, CorsMiddleware, CorsMiddlewareBuilder, OriginValidation};
pub use metrics::{HandlerStats, MetricsMiddleware};
pub use pipeline::{InterceptorPipeline, PipelinePhase, PipelineState, PreOutcome};
pub use tracing::{RequestSpan, TracingMiddleware};
