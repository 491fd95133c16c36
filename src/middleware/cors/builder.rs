use std::sync::Arc;

use http::Method;

use super::{CorsConfigError, CorsMiddleware, OriginValidation};

/// Builder for creating `CorsMiddleware` with a fluent API
///
/// Defaults:
/// - No origins allowed (empty list)
/// - Headers: `["Content-Type", "Authorization"]`
/// - Methods: `GET, POST, PUT, DELETE, OPTIONS`
/// - Credentials: `false`
/// - Exposed headers: empty
/// - Max age: `None` (no preflight caching)
///
/// ```rust
/// use brrtdispatch::middleware::{CorsConfigError, CorsMiddlewareBuilder};
///
/// let err = CorsMiddlewareBuilder::new()
///     .allowed_origins(&["*"])
///     .allow_credentials(true)
///     .build()
///     .unwrap_err();
/// assert_eq!(err, CorsConfigError::WildcardWithCredentials);
/// ```
pub struct CorsMiddlewareBuilder {
    allowed_origins: Vec<String>,
    origin_validator: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<Method>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
}

impl CorsMiddlewareBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allowed_origins: vec![],
            origin_validator: None,
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

    /// Set allowed origins. `&["*"]` allows every origin and cannot be
    /// combined with credentials.
    #[must_use]
    pub fn allowed_origins(mut self, origins: &[&str]) -> Self {
        self.allowed_origins = origins.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Decide origins with a predicate instead of a fixed list.
    #[must_use]
    pub fn origin_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.origin_validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn allowed_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods.to_vec();
        self
    }

    /// Set allowed headers; `&["*"]` allows all.
    #[must_use]
    pub fn allowed_headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Set headers to expose to JavaScript
    #[must_use]
    pub fn expose_headers(mut self, headers: &[&str]) -> Self {
        self.expose_headers = headers.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set preflight cache duration in seconds
    #[must_use]
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Validate the configuration and build the middleware.
    ///
    /// # Errors
    ///
    /// Returns [`CorsConfigError`] for a wildcard or empty origin list
    /// combined with credentials, or a malformed origin.
    pub fn build(self) -> Result<CorsMiddleware, CorsConfigError> {
        let wildcard = self.allowed_origins.iter().any(|o| o == "*");
        if self.allow_credentials && wildcard {
            return Err(CorsConfigError::WildcardWithCredentials);
        }
        if self.allow_credentials && self.allowed_origins.is_empty() && self.origin_validator.is_none()
        {
            return Err(CorsConfigError::EmptyOriginsWithCredentials);
        }
        if let Some(bad) = self
            .allowed_origins
            .iter()
            .find(|o| o.as_str() != "*" && !is_valid_origin(o))
        {
            return Err(CorsConfigError::InvalidOriginFormat {
                origin: bad.clone(),
            });
        }

        let origin_validation = match self.origin_validator {
            Some(validator) => OriginValidation::Custom(validator),
            None if wildcard => OriginValidation::Wildcard,
            None => OriginValidation::Exact(self.allowed_origins),
        };

        Ok(CorsMiddleware::new(
            origin_validation,
            self.allowed_headers,
            self.allowed_methods,
            self.allow_credentials,
            self.expose_headers,
            self.max_age,
        ))
    }
}

impl Default for CorsMiddlewareBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_origin(origin: &str) -> bool {
    match origin.split_once("://") {
        Some((scheme, host)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
                && !host.is_empty()
                && !host.contains('/')
        }
        None => false,
    }
}
