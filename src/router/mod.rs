//! # Router Module
//!
//! The router maps an inbound `(path, verb)` pair to exactly one registered
//! [`HandlerDescriptor`](crate::handler::HandlerDescriptor), or reports why
//! it could not.
//!
//! ## Overview
//!
//! Routes live in two tiers:
//!
//! 1. **Declarative**: literal path plus verb (or a wildcard verb). Exact
//!    verb beats wildcard. A known path with an unknown verb is a method
//!    mismatch carrying the allowed verbs.
//! 2. **Legacy**: literal path only, for fixed-shape handlers. Consulted
//!    only when the declarative tier does not know the path at all.
//!
//! Paths are compared byte for byte; no percent-decoding or trailing-slash
//! normalization happens here.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::handler::{Endpoint, HandlerReturn};
//! use brrtdispatch::router::{LookupError, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router
//!     .register("/pets", "GET", Endpoint::declarative("list_pets", |_| Ok(HandlerReturn::Nothing)))
//!     .unwrap();
//!
//! let hit = router.lookup("/pets", &Method::GET).unwrap();
//! assert_eq!(hit.descriptor.name(), "list_pets");
//!
//! let miss = router.lookup("/pets", &Method::POST).unwrap_err();
//! assert_eq!(miss, LookupError::MethodMismatch { allowed: vec![Method::GET] });
//! ```

mod core;

pub use core::{LookupError, RouteInfo, RouteMatch, RouteTier, Router};
