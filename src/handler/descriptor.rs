use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use http::Method;

use super::{Handler, HandlerResult};
use crate::binding::{Args, ParameterSpec};
use crate::context::{RequestContext, ResponseSink};

/// A handler plus its parameter declarations, before it is bound to a route.
///
/// ```rust
/// use brrtdispatch::binding::ParameterSpec;
/// use brrtdispatch::handler::Endpoint;
/// use brrtdispatch::result::ViewResult;
///
/// let echo = Endpoint::declarative("echo", |args| {
///     let name: String = args.take("name")?;
///     Ok(ViewResult::new("echo").with("message", format!("Hello, {name}")).into())
/// })
/// .param(ParameterSpec::named::<String>("name"));
/// assert_eq!(echo.name(), "echo");
/// ```
#[derive(Clone)]
pub struct Endpoint {
    name: Arc<str>,
    owner: Option<&'static str>,
    params: Vec<ParameterSpec>,
    handler: Handler,
}

impl Endpoint {
    /// Declarative handler from a closure or function.
    pub fn declarative<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut Args<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_handler(name, None, Handler::Declarative(Arc::new(f)))
    }

    /// Declarative handler bound to an owner instance.
    ///
    /// The owner is shared by every request and must synchronize its own
    /// mutable state.
    pub fn method<C>(name: &str, owner: Arc<C>, entry: fn(&C, &mut Args<'_>) -> HandlerResult) -> Self
    where
        C: Send + Sync + 'static,
    {
        let call = move |args: &mut Args<'_>| entry(&owner, args);
        Self::from_handler(
            name,
            Some(owner_name::<C>()),
            Handler::Declarative(Arc::new(call)),
        )
    }

    /// Fixed-shape handler taking the raw context and sink.
    pub fn legacy<F>(name: &str, f: F) -> Self
    where
        F: Fn(&RequestContext, &mut dyn ResponseSink) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_handler(name, None, Handler::Legacy(Arc::new(f)))
    }

    /// Fixed-shape handler bound to an owner instance.
    pub fn legacy_method<C>(
        name: &str,
        owner: Arc<C>,
        entry: fn(&C, &RequestContext, &mut dyn ResponseSink) -> HandlerResult,
    ) -> Self
    where
        C: Send + Sync + 'static,
    {
        let call = move |ctx: &RequestContext, res: &mut dyn ResponseSink| entry(&owner, ctx, res);
        Self::from_handler(name, Some(owner_name::<C>()), Handler::Legacy(Arc::new(call)))
    }

    /// Wrap an existing handler trait object.
    #[must_use]
    pub fn from_handler(name: &str, owner: Option<&'static str>, handler: Handler) -> Self {
        Self {
            name: Arc::from(name),
            owner,
            params: Vec::new(),
            handler,
        }
    }

    /// Append one parameter declaration.
    #[must_use]
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn params(mut self, specs: impl IntoIterator<Item = ParameterSpec>) -> Self {
        self.params.extend(specs);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub(crate) fn into_descriptor(self, pattern: &str, verb: Option<Method>) -> HandlerDescriptor {
        HandlerDescriptor {
            name: self.name,
            owner: self.owner,
            pattern: Arc::from(pattern),
            verb,
            params: self.params,
            handler: self.handler,
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("params", &self.params.len())
            .field("handler", &self.handler)
            .finish()
    }
}

/// Everything the dispatcher needs to run one registered handler.
///
/// Created by the router at registration and never modified afterwards.
pub struct HandlerDescriptor {
    name: Arc<str>,
    owner: Option<&'static str>,
    pattern: Arc<str>,
    verb: Option<Method>,
    params: Vec<ParameterSpec>,
    handler: Handler,
}

impl HandlerDescriptor {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Type name of the owner instance for method endpoints.
    #[must_use]
    pub fn owner(&self) -> Option<&'static str> {
        self.owner
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `None` for wildcard registrations and every legacy route.
    #[must_use]
    pub fn verb(&self) -> Option<&Method> {
        self.verb.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("pattern", &self.pattern)
            .field("verb", &self.verb)
            .field("params", &self.params)
            .field("handler", &self.handler)
            .finish()
    }
}

fn owner_name<C>() -> &'static str {
    let full = type_name::<C>();
    full.rsplit("::").next().unwrap_or(full)
}
