//! # Context Module
//!
//! Per-request views handed to every stage of the dispatch pipeline.
//!
//! - [`RequestContext`] is the read side: method, path, headers, named values
//!   (query string and form fields), the request id, an optional
//!   [`Session`] capability and a typed extension bag middleware uses for
//!   per-request state.
//! - [`ResponseSink`] is the write side: status, headers and body bytes. The
//!   network shell provides its own implementation; [`BufferedResponse`]
//!   collects everything in memory.
//!
//! Both are created by the shell for each request and discarded once
//! [`DispatchCore::dispatch`](crate::dispatcher::DispatchCore::dispatch)
//! returns.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::context::{BufferedResponse, RequestContext, ResponseSink};
//! use http::Method;
//!
//! let ctx = RequestContext::builder(Method::GET, "/echo?name=World&tag=a&tag=b")
//!     .header("Accept", "application/json")
//!     .build();
//!
//! assert_eq!(ctx.path(), "/echo");
//! assert_eq!(ctx.value("name"), Some("World"));
//! assert_eq!(ctx.values("tag").as_slice(), &["a", "b"]);
//! assert_eq!(ctx.header("accept"), Some("application/json"));
//!
//! let mut res = BufferedResponse::new();
//! res.write_body(b"ok");
//! assert_eq!(res.body(), b"ok");
//! ```

mod core;
mod response;
mod session;

pub use core::{
    HeaderVec, ParamVec, RequestContext, RequestContextBuilder, ValueList, MAX_INLINE_HEADERS,
    MAX_INLINE_PARAMS,
};
pub(crate) use core::DEFAULT_REQUEST_ID_HEADER;
pub use response::{BufferedResponse, ResponseSink};
pub use session::Session;
