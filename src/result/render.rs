use super::ViewResult;
use crate::context::{RequestContext, ResponseSink};

/// Turns a [`ViewResult`] into response bytes.
///
/// Implementations must be shareable across threads; one renderer serves
/// every concurrent dispatch.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        view: &ViewResult,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Writes the view model as a JSON object.
///
/// The view name is not part of the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(
        &self,
        view: &ViewResult,
        _ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()> {
        let body = serde_json::to_vec(&view.model)?;
        res.add_header("content-type", "application/json");
        res.write_body(&body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
