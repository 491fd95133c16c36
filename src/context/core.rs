use std::fmt;
use std::sync::Arc;

use http::{Extensions, Method};
use smallvec::SmallVec;

use super::Session;
use crate::config::DispatchConfig;
use crate::ids::RequestId;

/// Maximum number of named values before heap allocation.
/// Most handlers read a handful of query/form keys.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum number of headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Named values (query string and form fields) in arrival order.
///
/// Keys use `Arc<str>` so repeated keys can share a single allocation.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Request headers in arrival order, names kept as received.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Borrowed view of every value supplied for one key.
pub type ValueList<'a> = SmallVec<[&'a str; 4]>;

pub(crate) const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// Read-only view of one inbound request.
///
/// Handlers only ever see `&RequestContext`. Middleware hooks get `&mut` so
/// they can park per-request state in [`extensions_mut`](Self::extensions_mut);
/// the method, path, headers and named values never change after
/// construction.
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderVec,
    values: ParamVec,
    session: Option<Arc<dyn Session>>,
    extensions: Extensions,
}

impl RequestContext {
    /// Create a context for `method` and `target`, where target is the request
    /// path optionally followed by `?query`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        Self::builder(method, target).build()
    }

    /// Start building a context; see [`RequestContextBuilder`].
    #[must_use]
    pub fn builder(method: Method, target: &str) -> RequestContextBuilder {
        RequestContextBuilder::new(method, target)
    }

    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string. Routing matches this literally.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string (without the leading `?`), if the target had one.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    ///
    /// Returns the first occurrence when a header was sent more than once.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Get a named value
    ///
    /// Uses "last write wins" semantics: for `?limit=10&limit=20` this
    /// returns `"20"`. Use [`values`](Self::values) to see every occurrence.
    #[inline]
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value supplied for `name`, in arrival order. Empty if absent.
    #[must_use]
    pub fn values(&self, name: &str) -> ValueList<'_> {
        self.values
            .iter()
            .filter(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn contains_value(&self, name: &str) -> bool {
        self.values.iter().any(|(k, _)| k.as_ref() == name)
    }

    /// All named values in arrival order.
    #[must_use]
    pub fn named_values(&self) -> &ParamVec {
        &self.values
    }

    /// Session capability attached by the shell, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.session.as_ref()
    }

    /// Typed per-request capability bag.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("values", &self.values)
            .field("session", &self.session.as_ref().map(|s| s.id().to_string()))
            .finish_non_exhaustive()
    }
}

/// Builder used by the shell (and tests) to assemble a [`RequestContext`].
///
/// Query strings are decoded with `application/x-www-form-urlencoded` rules;
/// [`form_body`](Self::form_body) merges a urlencoded request body into the
/// same named-value list, after the query values.
pub struct RequestContextBuilder {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderVec,
    values: ParamVec,
    session: Option<Arc<dyn Session>>,
    extensions: Extensions,
    request_id: Option<RequestId>,
    request_id_header: String,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut values = ParamVec::new();
        if let Some(query) = query {
            push_urlencoded(&mut values, query.as_bytes());
        }

        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query: query.map(str::to_string),
            headers: HeaderVec::new(),
            values,
            session: None,
            extensions: Extensions::new(),
            request_id: None,
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    /// Append a named value as if it had arrived in the query string.
    #[must_use]
    pub fn value(mut self, name: &str, value: &str) -> Self {
        self.values.push((Arc::from(name), value.to_string()));
        self
    }

    /// Merge an `application/x-www-form-urlencoded` body into the named values.
    #[must_use]
    pub fn form_body(mut self, body: &[u8]) -> Self {
        push_urlencoded(&mut self.values, body);
        self
    }

    #[must_use]
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach a typed capability (database handle, tenant, ...).
    #[must_use]
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    #[must_use]
    pub fn request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Header the request id is read from when none is set explicitly.
    #[must_use]
    pub fn request_id_header(mut self, name: &str) -> Self {
        self.request_id_header = name.to_string();
        self
    }

    /// Apply the request-facing parts of `config` (the request id header).
    #[must_use]
    pub fn with_config(self, config: &DispatchConfig) -> Self {
        self.request_id_header(&config.request_id_header)
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        let request_id = self.request_id.unwrap_or_else(|| {
            let forwarded = self
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&self.request_id_header))
                .map(|(_, v)| v.as_str());
            RequestId::from_header_or_new(forwarded)
        });

        RequestContext {
            request_id,
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            values: self.values,
            session: self.session,
            extensions: self.extensions,
        }
    }
}

fn push_urlencoded(values: &mut ParamVec, input: &[u8]) {
    for (k, v) in url::form_urlencoded::parse(input) {
        values.push((Arc::from(k.as_ref()), v.into_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_split_into_path_and_query() {
        let ctx = RequestContext::new(Method::GET, "/users?limit=10&offset=20");
        assert_eq!(ctx.path(), "/users");
        assert_eq!(ctx.query(), Some("limit=10&offset=20"));
        assert_eq!(ctx.value("limit"), Some("10"));
        assert_eq!(ctx.value("offset"), Some("20"));
    }

    #[test]
    fn test_query_values_are_percent_decoded() {
        let ctx = RequestContext::new(Method::GET, "/search?q=hello%20world&city=S%C3%A3o+Paulo");
        assert_eq!(ctx.value("q"), Some("hello world"));
        assert_eq!(ctx.value("city"), Some("São Paulo"));
    }

    #[test]
    fn test_last_value_wins_but_all_are_kept() {
        let ctx = RequestContext::new(Method::GET, "/x?id=1&id=2&id=3");
        assert_eq!(ctx.value("id"), Some("3"));
        assert_eq!(ctx.values("id").as_slice(), &["1", "2", "3"]);
        assert!(ctx.values("missing").is_empty());
    }

    #[test]
    fn test_form_body_follows_query_values() {
        let ctx = RequestContext::builder(Method::POST, "/login?next=/home")
            .form_body(b"user=alice&next=/admin")
            .build();
        assert_eq!(ctx.value("user"), Some("alice"));
        assert_eq!(ctx.values("next").as_slice(), &["/home", "/admin"]);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = RequestContext::builder(Method::GET, "/")
            .header("Content-Type", "text/plain")
            .build();
        assert_eq!(ctx.header("content-type"), Some("text/plain"));
        assert_eq!(ctx.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(ctx.header("accept"), None);
    }

    #[test]
    fn test_request_id_taken_from_header() {
        let id = RequestId::new();
        let ctx = RequestContext::builder(Method::GET, "/")
            .header("X-Request-Id", &id.to_string())
            .build();
        assert_eq!(ctx.request_id(), id);
    }

    #[test]
    fn test_request_id_custom_header() {
        let id = RequestId::new();
        let ctx = RequestContext::builder(Method::GET, "/")
            .request_id_header("x-correlation-id")
            .header("X-Correlation-Id", &id.to_string())
            .build();
        assert_eq!(ctx.request_id(), id);
    }

    #[test]
    fn test_config_selects_request_id_header() {
        let id = RequestId::new();
        let config = DispatchConfig {
            request_id_header: "x-trace".to_string(),
            ..DispatchConfig::default()
        };
        let ctx = RequestContext::builder(Method::GET, "/")
            .with_config(&config)
            .header("X-Request-Id", &RequestId::new().to_string())
            .header("X-Trace", &id.to_string())
            .build();
        assert_eq!(ctx.request_id(), id);
    }

    #[test]
    fn test_named_values_keep_arrival_order() {
        let ctx = RequestContext::builder(Method::POST, "/x?b=2&a=1")
            .value("c", "3")
            .build();
        let keys: Vec<&str> = ctx.named_values().iter().map(|(k, _)| k.as_ref()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert!(ctx.contains_value("c"));
        assert!(!ctx.contains_value("d"));
    }

    #[test]
    fn test_empty_target_is_root() {
        let ctx = RequestContext::new(Method::GET, "?a=1");
        assert_eq!(ctx.path(), "/");
        assert_eq!(ctx.value("a"), Some("1"));
    }

    #[test]
    fn test_extensions_hold_typed_capabilities() {
        #[derive(Clone, Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = RequestContext::builder(Method::GET, "/")
            .extension(Tenant("acme"))
            .build();
        assert_eq!(ctx.extensions().get::<Tenant>(), Some(&Tenant("acme")));
        ctx.extensions_mut().insert(42u32);
        assert_eq!(ctx.extensions().get::<u32>(), Some(&42));
    }
}
