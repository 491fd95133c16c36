//! # brrtdispatch
//!
//! **brrtdispatch** is the transport-agnostic core of a web framework: it
//! takes an already-parsed request, finds the handler registered for its
//! path and verb, binds the handler's declared parameters, runs an ordered
//! middleware chain around it and hands the result to a renderer.
//!
//! There is no HTTP server, template engine or OpenAPI loader here. An
//! embedding shell turns its own request type into a
//! [`RequestContext`](context::RequestContext), implements
//! [`ResponseSink`](context::ResponseSink) over its response type and calls
//! [`DispatchCore::dispatch`](dispatcher::DispatchCore::dispatch).
//!
//! ## Architecture
//!
//! - **[`router`]** - two-tier route table (declarative `(path, verb)` and
//!   legacy path-only)
//! - **[`binding`]** - parameter specs, value conversion and object binding
//! - **[`invoker`]** - adapters that call each handler shape
//! - **[`middleware`]** - pre/post/after hooks and the interceptor pipeline
//! - **[`result`]** - view normalization and renderers
//! - **[`dispatcher`]** - the [`DispatchCore`](dispatcher::DispatchCore)
//!   and its builder
//! - **[`context`]** - request context, response sink and session capability
//! - **[`config`]** / **[`logging`]** - tunables and subscriber setup for
//!   the embedding shell
//!
//! ### Dispatch Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Shell
//!     participant Core as DispatchCore
//!     participant Router
//!     participant MW as InterceptorPipeline
//!     participant Binder as ParameterBinder
//!     participant Inv as AdapterSelector
//!     participant Res as ResultDispatcher
//!
//!     Shell->>Core: dispatch(ctx, sink)
//!     Core->>Router: lookup(path, verb)
//!     Router-->>Core: descriptor | miss | mismatch
//!     Core->>MW: run_pre
//!     MW-->>Core: continue | stop | failed
//!     Core->>Binder: bind(descriptor, ctx)
//!     Core->>Inv: invoke(descriptor, args)
//!     Inv-->>Core: HandlerReturn
//!     Core->>MW: run_post (reverse)
//!     Core->>Res: normalize + render
//!     Core->>MW: run_after (reverse, always)
//!     Core-->>Shell: DispatchOutcome
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtdispatch::{
//!     BufferedResponse, DispatchCore, Endpoint, ParameterSpec, RequestContext, ViewResult,
//! };
//! use http::Method;
//!
//! let mut builder = DispatchCore::builder();
//! builder
//!     .register(
//!         "/pets",
//!         "GET",
//!         Endpoint::declarative("list_pets", |args| {
//!             let limit: Option<u32> = args.take("limit")?;
//!             Ok(ViewResult::new("pets").with("limit", limit.unwrap_or(20)).into())
//!         })
//!         .param(ParameterSpec::named::<Option<u32>>("limit")),
//!     )
//!     .unwrap();
//! let core = builder.build().unwrap();
//!
//! let mut ctx = RequestContext::new(Method::GET, "/pets?limit=5");
//! let mut res = BufferedResponse::new();
//! core.dispatch(&mut ctx, &mut res);
//! assert_eq!(res.json().unwrap()["limit"], 5);
//! ```
//!
//! ## Logging
//!
//! Every stage emits `tracing` events with `request_id`, `handler_name`,
//! `method` and `path` fields. The crate never installs a subscriber; see
//! [`logging::init_logging_with_config`].

extern crate self as brrtdispatch;

pub mod binding;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod invoker;
pub mod logging;
pub mod middleware;
pub mod result;
pub mod router;

pub use binding::{Args, Bindable, ParamType, ParameterSpec, SourceKind, TargetType};
pub use brrtdispatch_macros::{Bindable, ParamEnum};
pub use config::DispatchConfig;
pub use context::{BufferedResponse, RequestContext, ResponseSink, Session};
pub use dispatcher::{DispatchCore, DispatchCoreBuilder, DispatchOutcome, ErrorResolver};
pub use error::{ConfigError, DispatchError};
pub use handler::{Endpoint, HandlerResult, HandlerReturn};
pub use ids::RequestId;
pub use middleware::Middleware;
pub use result::{Renderer, ViewResult};
pub use router::Router;
