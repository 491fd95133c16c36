use serde_json::json;
use tracing::warn;

use crate::context::{RequestContext, ResponseSink};
use crate::error::DispatchError;

/// Writes the response for a dispatch error.
///
/// Called for routing misses, method mismatches, binding failures, handler
/// failures and render failures. It is not called for pre-phase middleware
/// or configuration errors; those reach the caller through
/// [`DispatchOutcome`](super::DispatchOutcome) with a bare `500`.
pub trait ErrorResolver: Send + Sync {
    fn resolve(
        &self,
        error: &DispatchError,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()>;
}

/// JSON problem body: `{"error", "status", "request_id"[, "detail"]}`.
///
/// `detail` is always present for client errors and only present for server
/// errors when `expose_details` is set. `405` responses carry an `Allow`
/// header.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorResolver {
    expose_details: bool,
}

impl DefaultErrorResolver {
    #[must_use]
    pub fn new(expose_details: bool) -> Self {
        Self { expose_details }
    }
}

impl ErrorResolver for DefaultErrorResolver {
    fn resolve(
        &self,
        error: &DispatchError,
        ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()> {
        if res.is_committed() {
            warn!(
                request_id = %ctx.request_id(),
                error = %error,
                "Response already committed, error not written"
            );
            return Ok(());
        }

        let status = error.status();
        let mut body = json!({
            "error": error.kind(),
            "status": status.as_u16(),
            "request_id": ctx.request_id().to_string(),
        });
        if status.is_client_error() || self.expose_details {
            body["detail"] = json!(error.to_string());
        }
        let bytes = serde_json::to_vec(&body)?;

        res.reset();
        res.set_status(status);
        res.add_header("content-type", "application/json");
        if let DispatchError::MethodMismatch { allowed, .. } = error {
            let allow = allowed
                .iter()
                .map(http::Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            res.add_header("allow", &allow);
        }
        res.write_body(&bytes);
        Ok(())
    }
}
