use std::sync::Arc;

use http::StatusCode;

use super::HeaderVec;

/// Write side of a request, implemented by the network shell.
///
/// The core never assumes bytes reach the wire immediately. A sink that
/// streams should report [`is_committed`](Self::is_committed) once headers
/// are flushed so error resolution can avoid rewriting a started response.
pub trait ResponseSink {
    fn set_status(&mut self, status: StatusCode);
    fn status(&self) -> StatusCode;
    fn add_header(&mut self, name: &str, value: &str);
    fn write_body(&mut self, bytes: &[u8]);

    fn is_committed(&self) -> bool {
        false
    }

    /// Discard buffered status, headers and body. No-op for committed sinks.
    fn reset(&mut self) {}
}

/// In-memory [`ResponseSink`].
///
/// Starts with `200 OK`, no headers and an empty body.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: StatusCode,
    headers: HeaderVec,
    body: Vec<u8>,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value written for `name`, in order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, lossily.
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderVec, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((Arc::from(name), value.to_string()));
    }

    fn write_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }
}
