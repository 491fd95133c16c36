use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use super::Renderer;
use crate::context::{RequestContext, ResponseSink};
use crate::error::panic_message;
use crate::handler::{HandlerReturn, Model};

/// A named view plus the model it is rendered with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewResult {
    pub name: String,
    pub model: Model,
}

impl ViewResult {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: Model::new(),
        }
    }

    #[must_use]
    pub fn with_model(name: impl Into<String>, model: Model) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace one model entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.model.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.model.get(key)
    }
}

/// Normalized handler output.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    View(ViewResult),
    /// The handler produced the response itself; nothing is rendered.
    Direct,
}

impl DispatchResult {
    #[must_use]
    pub fn view(&self) -> Option<&ViewResult> {
        match self {
            DispatchResult::View(v) => Some(v),
            DispatchResult::Direct => None,
        }
    }

    #[must_use]
    pub fn view_mut(&mut self) -> Option<&mut ViewResult> {
        match self {
            DispatchResult::View(v) => Some(v),
            DispatchResult::Direct => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("handler returned a view with an empty name")]
    EmptyViewName,

    #[error("rendering view `{view}` failed: {source}")]
    Failed {
        view: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("renderer panicked on view `{view}`: {message}")]
    Panicked { view: String, message: String },
}

/// Turns raw handler output into a [`DispatchResult`] and renders views.
#[derive(Clone)]
pub struct ResultDispatcher {
    renderer: Arc<dyn Renderer>,
}

impl ResultDispatcher {
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }

    #[must_use]
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    #[allow(clippy::unused_self)]
    pub fn normalize(&self, raw: HandlerReturn) -> Result<DispatchResult, RenderError> {
        match raw {
            HandlerReturn::View(view) if view.name.trim().is_empty() => {
                Err(RenderError::EmptyViewName)
            }
            HandlerReturn::View(view) => Ok(DispatchResult::View(view)),
            HandlerReturn::Written | HandlerReturn::Nothing => Ok(DispatchResult::Direct),
        }
    }

    /// Render a view result; `Direct` results are left alone.
    pub fn render(
        &self,
        result: &DispatchResult,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> Result<(), RenderError> {
        let DispatchResult::View(view) = result else {
            debug!(request_id = %ctx.request_id(), "Direct result, render skipped");
            return Ok(());
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| self.renderer.render(view, ctx, res)));
        match outcome {
            Ok(Ok(())) => {
                debug!(
                    request_id = %ctx.request_id(),
                    view = %view.name,
                    renderer = %self.renderer.name(),
                    "View rendered"
                );
                Ok(())
            }
            Ok(Err(source)) => Err(RenderError::Failed {
                view: view.name.clone(),
                source,
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %ctx.request_id(),
                    view = %view.name,
                    panic = %message,
                    "Renderer panicked"
                );
                Err(RenderError::Panicked {
                    view: view.name.clone(),
                    message,
                })
            }
        }
    }
}

impl std::fmt::Debug for ResultDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultDispatcher")
            .field("renderer", &self.renderer.name())
            .finish()
    }
}
