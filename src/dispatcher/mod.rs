//! # Dispatcher Module
//!
//! [`DispatchCore`] ties the pieces together. One call to
//! [`DispatchCore::dispatch`] runs:
//!
//! 1. route lookup ([`Router`](crate::router::Router))
//! 2. middleware pre hooks
//! 3. parameter binding and handler invocation
//! 4. middleware post hooks
//! 5. rendering
//! 6. error resolution (for resolvable errors)
//! 7. middleware after hooks
//!
//! Registration happens on [`DispatchCoreBuilder`]; the built core is
//! immutable and `Send + Sync`.
//!
//! ```rust
//! use brrtdispatch::binding::ParameterSpec;
//! use brrtdispatch::context::{BufferedResponse, RequestContext};
//! use brrtdispatch::dispatcher::DispatchCore;
//! use brrtdispatch::handler::Endpoint;
//! use brrtdispatch::result::ViewResult;
//! use http::{Method, StatusCode};
//!
//! let mut builder = DispatchCore::builder();
//! builder
//!     .register(
//!         "/echo",
//!         "GET",
//!         Endpoint::declarative("echo", |args| {
//!             let name: String = args.take("name")?;
//!             Ok(ViewResult::new("echo").with("message", format!("Hello, {name}")).into())
//!         })
//!         .param(ParameterSpec::named::<String>("name")),
//!     )
//!     .unwrap();
//! let core = builder.build().unwrap();
//!
//! let mut ctx = RequestContext::new(Method::GET, "/echo?name=World");
//! let mut res = BufferedResponse::new();
//! let outcome = core.dispatch(&mut ctx, &mut res);
//! assert_eq!(outcome.status, StatusCode::OK);
//! assert_eq!(res.json().unwrap()["message"], "Hello, World");
//! ```

mod builder;
mod core;
mod resolver;

pub use builder::DispatchCoreBuilder;
pub use core::{DispatchCore, DispatchOutcome};
pub use resolver::{DefaultErrorResolver, ErrorResolver};
