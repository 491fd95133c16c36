//! # Handler Module
//!
//! Application handlers and the immutable descriptors the router stores.
//!
//! Two handler shapes are supported:
//!
//! - **Declarative** handlers declare an ordered parameter list and receive
//!   resolved [`Args`]; the binder does all request parsing.
//! - **Legacy** handlers take the raw request context and response sink and
//!   do their own parsing. They are registered by path only.
//!
//! Both return [`HandlerResult`]: a view to render, a marker that the
//! handler wrote the response itself, or nothing.

mod descriptor;

use std::sync::Arc;

pub use descriptor::{Endpoint, HandlerDescriptor};

use crate::binding::Args;
use crate::context::{RequestContext, ResponseSink};
use crate::result::ViewResult;

/// View model handed to the renderer.
pub type Model = serde_json::Map<String, serde_json::Value>;

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerReturn {
    /// Render the named view with this model.
    View(ViewResult),
    /// The handler wrote status, headers and body directly.
    Written,
    /// No output; the response is left as the handler found it.
    Nothing,
}

impl From<ViewResult> for HandlerReturn {
    fn from(view: ViewResult) -> Self {
        HandlerReturn::View(view)
    }
}

impl From<()> for HandlerReturn {
    fn from((): ()) -> Self {
        HandlerReturn::Nothing
    }
}

/// Return type of every handler.
pub type HandlerResult = anyhow::Result<HandlerReturn>;

/// Handler with a fixed two-argument shape.
pub trait LegacyHandler: Send + Sync {
    fn handle(&self, ctx: &RequestContext, res: &mut dyn ResponseSink) -> HandlerResult;
}

impl<F> LegacyHandler for F
where
    F: Fn(&RequestContext, &mut dyn ResponseSink) -> HandlerResult + Send + Sync,
{
    fn handle(&self, ctx: &RequestContext, res: &mut dyn ResponseSink) -> HandlerResult {
        self(ctx, res)
    }
}

/// Handler fed by the parameter binder.
pub trait DeclarativeHandler: Send + Sync {
    fn call(&self, args: &mut Args<'_>) -> HandlerResult;
}

impl<F> DeclarativeHandler for F
where
    F: Fn(&mut Args<'_>) -> HandlerResult + Send + Sync,
{
    fn call(&self, args: &mut Args<'_>) -> HandlerResult {
        self(args)
    }
}

/// Invocation shape of a registered handler.
#[derive(Clone)]
pub enum Handler {
    Legacy(Arc<dyn LegacyHandler>),
    Declarative(Arc<dyn DeclarativeHandler>),
}

impl Handler {
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Handler::Legacy(_) => "legacy",
            Handler::Declarative(_) => "declarative",
        }
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Handler::Legacy(_))
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler::{}", self.shape())
    }
}
