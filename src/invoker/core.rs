use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::binding::{Args, BoundArgs};
use crate::context::{RequestContext, ResponseSink};
use crate::error::{panic_message, DispatchError};
use crate::handler::{Handler, HandlerDescriptor, HandlerResult, HandlerReturn};

/// One way of calling a handler.
pub trait Invoker: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, descriptor: &HandlerDescriptor) -> bool;

    fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        args: BoundArgs,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> HandlerResult;
}

/// Calls declarative handlers with the bound [`Args`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclarativeInvoker;

impl Invoker for DeclarativeInvoker {
    fn name(&self) -> &'static str {
        "declarative"
    }

    fn supports(&self, descriptor: &HandlerDescriptor) -> bool {
        matches!(descriptor.handler(), Handler::Declarative(_))
    }

    fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        args: BoundArgs,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> HandlerResult {
        match descriptor.handler() {
            Handler::Declarative(h) => {
                let mut args = Args::new(ctx, res, args);
                h.call(&mut args)
            }
            Handler::Legacy(_) => Err(anyhow::anyhow!(
                "declarative invoker cannot call legacy handler `{}`",
                descriptor.name()
            )),
        }
    }
}

/// Calls fixed-shape handlers with the raw context and sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyInvoker;

impl Invoker for LegacyInvoker {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn supports(&self, descriptor: &HandlerDescriptor) -> bool {
        matches!(descriptor.handler(), Handler::Legacy(_))
    }

    fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        _args: BoundArgs,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> HandlerResult {
        match descriptor.handler() {
            Handler::Legacy(h) => h.handle(ctx, res),
            Handler::Declarative(_) => Err(anyhow::anyhow!(
                "legacy invoker cannot call declarative handler `{}`",
                descriptor.name()
            )),
        }
    }
}

/// Ordered invoker list; the first supporting invoker wins.
#[derive(Clone)]
pub struct AdapterSelector {
    invokers: Vec<Arc<dyn Invoker>>,
}

impl Default for AdapterSelector {
    fn default() -> Self {
        Self {
            invokers: vec![Arc::new(DeclarativeInvoker), Arc::new(LegacyInvoker)],
        }
    }
}

impl AdapterSelector {
    /// Selector with no invokers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            invokers: Vec::new(),
        }
    }

    /// Add an invoker that takes priority over every existing one.
    pub fn push_front(&mut self, invoker: Arc<dyn Invoker>) {
        self.invokers.insert(0, invoker);
    }

    /// Add an invoker consulted after every existing one.
    pub fn push(&mut self, invoker: Arc<dyn Invoker>) {
        self.invokers.push(invoker);
    }

    #[must_use]
    pub fn select(&self, descriptor: &HandlerDescriptor) -> Option<&Arc<dyn Invoker>> {
        self.invokers.iter().find(|i| i.supports(descriptor))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }

    /// Run the handler through the first supporting invoker.
    ///
    /// Handler errors and panics both become
    /// [`DispatchError::HandlerInvocation`].
    pub fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        args: BoundArgs,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> Result<HandlerReturn, DispatchError> {
        let Some(invoker) = self.select(descriptor) else {
            error!(
                request_id = %ctx.request_id(),
                handler_name = %descriptor.name(),
                shape = descriptor.handler().shape(),
                "No invoker supports handler"
            );
            return Err(DispatchError::Configuration {
                handler: descriptor.shared_name(),
            });
        };

        debug!(
            request_id = %ctx.request_id(),
            handler_name = %descriptor.name(),
            invoker = invoker.name(),
            "Handler execution start"
        );

        match catch_unwind(AssertUnwindSafe(|| invoker.invoke(descriptor, args, ctx, res))) {
            Ok(Ok(ret)) => Ok(ret),
            Ok(Err(source)) => Err(DispatchError::HandlerInvocation {
                handler: descriptor.shared_name(),
                source,
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let backtrace = Backtrace::capture();
                error!(
                    request_id = %ctx.request_id(),
                    handler_name = %descriptor.name(),
                    panic_message = %message,
                    backtrace = %backtrace,
                    "Handler panicked"
                );
                Err(DispatchError::HandlerInvocation {
                    handler: descriptor.shared_name(),
                    source: anyhow::anyhow!("handler panicked: {message}"),
                })
            }
        }
    }
}

impl std::fmt::Debug for AdapterSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.invokers.iter().map(|i| i.name()).collect();
        f.debug_struct("AdapterSelector").field("invokers", &names).finish()
    }
}
