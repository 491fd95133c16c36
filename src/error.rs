//! Error types shared across the dispatch pipeline.

use std::any::Any;
use std::sync::Arc;

use http::{Method, StatusCode};
use thiserror::Error;

use crate::binding::BindingError;
use crate::middleware::MiddlewareError;
use crate::result::RenderError;

/// Why a dispatch did not complete normally.
///
/// Every variant maps to a status code through [`status`](Self::status).
/// Only [`is_resolvable`](Self::is_resolvable) errors are handed to the
/// [`ErrorResolver`](crate::dispatcher::ErrorResolver).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler for {method} {path}")]
    RoutingMiss { method: Method, path: String },

    #[error("{method} not allowed for {path}")]
    MethodMismatch {
        path: String,
        method: Method,
        allowed: Vec<Method>,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("handler `{handler}` failed: {source}")]
    HandlerInvocation {
        handler: Arc<str>,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    #[error("no invoker supports handler `{handler}`")]
    Configuration { handler: Arc<str> },
}

impl DispatchError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RoutingMiss { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodMismatch { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Binding(_) => StatusCode::BAD_REQUEST,
            DispatchError::HandlerInvocation { .. }
            | DispatchError::Render(_)
            | DispatchError::Middleware(_)
            | DispatchError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable short name, used in logs and problem bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::RoutingMiss { .. } => "routing_miss",
            DispatchError::MethodMismatch { .. } => "method_mismatch",
            DispatchError::Binding(BindingError::MissingRequired { .. }) => "missing_parameter",
            DispatchError::Binding(BindingError::TypeConversion { .. }) => "type_conversion",
            DispatchError::HandlerInvocation { .. } => "handler_invocation",
            DispatchError::Render(_) => "render",
            DispatchError::Middleware(_) => "middleware",
            DispatchError::Configuration { .. } => "configuration",
        }
    }

    /// Whether the error resolver gets to write a response for this error.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        !matches!(
            self,
            DispatchError::Middleware(_) | DispatchError::Configuration { .. }
        )
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

/// Registration-time problems. `DispatchCoreBuilder` methods and
/// [`build`](crate::dispatcher::DispatchCoreBuilder::build) return these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("invalid HTTP verb `{verb}`")]
    InvalidVerb { verb: String },

    #[error("legacy route `{path}` needs a legacy handler, `{handler}` is declarative")]
    LegacyShape { path: String, handler: String },

    #[error("legacy handler `{handler}` cannot declare parameters")]
    LegacyParameters { handler: String },

    #[error("handler `{handler}` declares parameter `{parameter}` twice")]
    DuplicateParameter { handler: String, parameter: String },

    #[error("handler `{handler}` parameter `{parameter}`: unsupported target {target}: {reason}")]
    UnsupportedTarget {
        handler: String,
        parameter: String,
        target: String,
        reason: String,
    },

    #[error("handler `{handler}` parameter `{parameter}`: default `{default}` is invalid: {reason}")]
    InvalidDefault {
        handler: String,
        parameter: String,
        default: String,
        reason: String,
    },

    #[error("handler `{handler}` parameter #{index} has no name")]
    MissingParameterName { handler: String, index: usize },

    #[error("no invoker supports `{shape}` handler `{handler}`")]
    NoInvoker { handler: String, shape: &'static str },
}

/// Best-effort text of a `catch_unwind` payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
