use http::StatusCode;
use tracing::warn;

use super::{Flow, Middleware};
use crate::context::{RequestContext, ResponseSink};
use crate::handler::HandlerDescriptor;

/// Rejects requests whose credential header does not carry the expected
/// token with `401 Unauthorized` and stops the chain.
pub struct AuthMiddleware {
    token: String,
    header: String,
}

impl AuthMiddleware {
    /// Compare the whole `Authorization` header against `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            header: "authorization".to_string(),
        }
    }

    /// Expect `Authorization: Bearer <token>`.
    #[must_use]
    pub fn bearer(token: &str) -> Self {
        Self::new(format!("Bearer {token}"))
    }

    /// Read the credential from another header, e.g. `x-api-key`.
    #[must_use]
    pub fn with_header(mut self, header: &str) -> Self {
        self.header = header.to_ascii_lowercase();
        self
    }
}

impl std::fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("header", &self.header)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn pre(
        &self,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        match ctx.header(&self.header) {
            Some(h) if h == self.token => Ok(Flow::Continue),
            presented => {
                warn!(
                    request_id = %ctx.request_id(),
                    handler_name = %handler.name(),
                    header = %self.header,
                    credential_present = presented.is_some(),
                    "Authentication failed"
                );
                let body = serde_json::to_vec(&serde_json::json!({ "error": "Unauthorized" }))?;
                res.set_status(StatusCode::UNAUTHORIZED);
                res.add_header("content-type", "application/json");
                res.write_body(&body);
                Ok(Flow::Stop)
            }
        }
    }
}
