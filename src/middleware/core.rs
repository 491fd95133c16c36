use std::any::type_name;
use std::fmt;

use http::StatusCode;
use thiserror::Error;

use crate::context::{RequestContext, ResponseSink};
use crate::error::DispatchError;
use crate::handler::HandlerDescriptor;
use crate::result::DispatchResult;

/// Decision returned by a pre-phase hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next middleware, then the handler.
    Continue,
    /// Skip the handler and the rest of the chain. The hook is expected to
    /// have written the response.
    Stop,
}

/// What the after-phase hooks get to see about a finished dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub handler: &'a HandlerDescriptor,
    pub handler_invoked: bool,
    pub status: StatusCode,
    pub error: Option<&'a DispatchError>,
}

impl Completion<'_> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Cross-cutting hook around a handler.
///
/// Instances are shared by every concurrent request and must not keep
/// per-request state in `self`; park it in
/// [`RequestContext::extensions_mut`] instead. All hooks default to no-ops.
///
/// - [`pre`](Self::pre) runs in registration order before the handler. An
///   error aborts the dispatch and is reported to the caller.
/// - [`post`](Self::post) runs in reverse order after a successful handler
///   and may edit the result. Errors are logged and ignored.
/// - [`after`](Self::after) runs in reverse order exactly once for every
///   middleware whose `pre` was entered and finished (continued or stopped).
///   Errors are logged and ignored.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn pre(
        &self,
        _ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        _handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        Ok(Flow::Continue)
    }

    fn post(
        &self,
        _ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        _handler: &HandlerDescriptor,
        _result: &mut DispatchResult,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn after(
        &self,
        _ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        _completion: &Completion<'_>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Which hook a middleware failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Pre,
    Post,
    After,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Pre => f.write_str("pre"),
            HookPhase::Post => f.write_str("post"),
            HookPhase::After => f.write_str("after"),
        }
    }
}

/// A middleware hook returned an error or panicked.
#[derive(Debug, Error)]
#[error("middleware `{middleware}` (#{index}) failed in {phase}: {source}")]
pub struct MiddlewareError {
    pub middleware: &'static str,
    pub index: usize,
    pub phase: HookPhase,
    #[source]
    pub source: anyhow::Error,
}
