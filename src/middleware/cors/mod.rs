mod builder;
mod error;

pub use builder::CorsMiddlewareBuilder;
pub use error::CorsConfigError;

use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{debug, warn};

use crate::context::{RequestContext, ResponseSink};
use crate::handler::HandlerDescriptor;
use crate::middleware::{Flow, Middleware};

/// Origin validation strategy
#[derive(Clone)]
pub enum OriginValidation {
    /// Exact string matching
    Exact(Vec<String>),
    /// Wildcard (allow all origins)
    Wildcard,
    /// Custom validation function
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl std::fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginValidation::Exact(origins) => f.debug_tuple("Exact").field(origins).finish(),
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl OriginValidation {
    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Exact(origins) => origins.iter().any(|o| o == origin),
            OriginValidation::Wildcard => true,
            OriginValidation::Custom(validator) => validator(origin),
        }
    }

    fn is_wildcard(&self) -> bool {
        matches!(self, OriginValidation::Wildcard)
    }
}

/// CORS (Cross-Origin Resource Sharing) middleware
///
/// Answers preflight requests from `pre` and stops the chain; for other
/// cross-origin requests it validates the `Origin` header and adds the CORS
/// response headers before the handler runs. Disallowed origins get
/// `403 Forbidden`.
///
/// Preflight requests only reach middleware for routes that accept
/// `OPTIONS`, either explicitly or through a wildcard registration.
///
/// ```rust
/// use brrtdispatch::middleware::CorsMiddlewareBuilder;
/// use http::Method;
///
/// let cors = CorsMiddlewareBuilder::new()
///     .allowed_origins(&["https://example.com"])
///     .allowed_methods(&[Method::GET, Method::POST])
///     .allow_credentials(true)
///     .build()
///     .unwrap();
/// # let _ = cors;
/// ```
pub struct CorsMiddleware {
    pub(crate) origin_validation: OriginValidation,
    pub(crate) allowed_headers: Vec<String>,
    pub(crate) allowed_methods: Vec<Method>,
    pub(crate) allow_credentials: bool,
    pub(crate) expose_headers: Vec<String>,
    pub(crate) max_age: Option<u32>,
}

impl CorsMiddleware {
    /// Construct directly; prefer [`CorsMiddlewareBuilder`], which validates.
    #[must_use]
    pub fn new(
        origin_validation: OriginValidation,
        allowed_headers: Vec<String>,
        allowed_methods: Vec<Method>,
        allow_credentials: bool,
        expose_headers: Vec<String>,
        max_age: Option<u32>,
    ) -> Self {
        Self {
            origin_validation,
            allowed_headers,
            allowed_methods,
            allow_credentials,
            expose_headers,
            max_age,
        }
    }

    /// Allow every origin without credentials. Development only.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            origin_validation: OriginValidation::Wildcard,
            ..Self::default()
        }
    }

    /// Validate an origin, returning the value for `Access-Control-Allow-Origin`.
    fn validate_origin(&self, origin: &str) -> Option<String> {
        if !self.origin_validation.is_allowed(origin) {
            return None;
        }
        if self.origin_validation.is_wildcard() {
            Some("*".to_string())
        } else {
            Some(origin.to_string())
        }
    }

    /// Same-origin requests carry an `Origin` whose host matches `Host`.
    fn is_same_origin(ctx: &RequestContext, origin: &str) -> bool {
        let Some(host) = ctx.header("host") else {
            return false;
        };
        let Some((_, origin_host_port)) = origin.split_once("://") else {
            return false;
        };
        let origin_host = origin_host_port
            .split(':')
            .next()
            .unwrap_or(origin_host_port);
        host.eq_ignore_ascii_case(origin_host) || host.eq_ignore_ascii_case(origin_host_port)
    }

    /// Check the requested method and headers of a preflight.
    fn preflight_allowed(&self, ctx: &RequestContext, requested_method: &str) -> bool {
        let Ok(method) = requested_method.trim().parse::<Method>() else {
            warn!(
                request_id = %ctx.request_id(),
                requested_method = %requested_method,
                "CORS preflight: invalid Access-Control-Request-Method"
            );
            return false;
        };
        if !self.allowed_methods.contains(&method) {
            warn!(
                request_id = %ctx.request_id(),
                requested_method = %method,
                "CORS preflight: method not allowed"
            );
            return false;
        }

        let allow_all_headers = self.allowed_headers.iter().any(|h| h == "*");
        if let Some(requested) = ctx.header("access-control-request-headers") {
            if !allow_all_headers {
                for header in requested.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                    if !self
                        .allowed_headers
                        .iter()
                        .any(|h| h.eq_ignore_ascii_case(header))
                    {
                        warn!(
                            request_id = %ctx.request_id(),
                            header = %header,
                            "CORS preflight: header not allowed"
                        );
                        return false;
                    }
                }
            }
        }
        true
    }

    fn joined_methods(&self) -> String {
        self.allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn forbid(res: &mut dyn ResponseSink) -> Flow {
        res.set_status(StatusCode::FORBIDDEN);
        Flow::Stop
    }
}

impl std::fmt::Debug for CorsMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsMiddleware")
            .field("origin_validation", &self.origin_validation)
            .field("allowed_methods", &self.allowed_methods)
            .field("allow_credentials", &self.allow_credentials)
            .finish_non_exhaustive()
    }
}

/// Secure by default: no origins allowed until configured.
impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            origin_validation: OriginValidation::Exact(vec![]),
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
        }
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn pre(
        &self,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        let Some(origin) = ctx.header("origin") else {
            return Ok(Flow::Continue);
        };
        let preflight = ctx.method() == Method::OPTIONS;

        if !preflight && Self::is_same_origin(ctx, origin) {
            debug!(request_id = %ctx.request_id(), "CORS: same-origin request, skipping CORS headers");
            return Ok(Flow::Continue);
        }

        let Some(allowed_origin) = self.validate_origin(origin) else {
            warn!(
                request_id = %ctx.request_id(),
                handler_name = %handler.name(),
                origin = %origin,
                preflight,
                "CORS: origin not allowed"
            );
            return Ok(Self::forbid(res));
        };

        if preflight {
            let Some(requested_method) = ctx.header("access-control-request-method") else {
                // OPTIONS with an Origin but no preflight header is an ordinary request.
                res.add_header("access-control-allow-origin", &allowed_origin);
                res.add_header("vary", "Origin");
                return Ok(Flow::Continue);
            };
            if !self.preflight_allowed(ctx, requested_method) {
                return Ok(Self::forbid(res));
            }
            res.set_status(StatusCode::NO_CONTENT);
            res.add_header("access-control-allow-origin", &allowed_origin);
            res.add_header("access-control-allow-methods", &self.joined_methods());
            res.add_header("access-control-allow-headers", &self.allowed_headers.join(", "));
            if self.allow_credentials {
                res.add_header("access-control-allow-credentials", "true");
            }
            if let Some(age) = self.max_age {
                res.add_header("access-control-max-age", &age.to_string());
            }
            res.add_header("vary", "Origin");
            debug!(
                request_id = %ctx.request_id(),
                origin = %allowed_origin,
                "CORS preflight answered"
            );
            return Ok(Flow::Stop);
        }

        res.add_header("access-control-allow-origin", &allowed_origin);
        if self.allow_credentials {
            res.add_header("access-control-allow-credentials", "true");
        }
        if !self.expose_headers.is_empty() {
            res.add_header("access-control-expose-headers", &self.expose_headers.join(", "));
        }
        res.add_header("vary", "Origin");
        Ok(Flow::Continue)
    }
}
