//! # Binding Module
//!
//! Turns request data into handler arguments.
//!
//! ## Overview
//!
//! Every declarative handler declares an ordered list of [`ParameterSpec`]s.
//! Each one names a [`SourceKind`]:
//!
//! - `ContextRequest` / `ContextResponse` inject the request context or the
//!   response sink
//! - `NamedValue` reads one request key (query string or form field) and
//!   converts it to the declared [`TargetType`]
//! - `BoundObject` starts from a zero-value struct and assigns every field
//!   whose key is present, through a setter table generated by
//!   `#[derive(Bindable)]`
//!
//! Parameter lists are validated once at registration by
//! [`ParameterBinder::validate`]; request-time binding by
//! [`ParameterBinder::bind`] only looks up values and converts strings.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::binding::ParameterSpec;
//!
//! let params = vec![
//!     ParameterSpec::named::<String>("name"),
//!     ParameterSpec::named::<u32>("limit").default_value("20"),
//!     ParameterSpec::named::<Option<bool>>("verbose"),
//! ];
//! assert!(params[0].is_required());
//! assert!(!params[2].is_required());
//! ```

mod args;
mod binder;
mod object;
mod parameter;
mod types;

pub use args::{ArgumentError, Args};
pub use binder::{BindingError, BoundArg, BoundArgs, ParameterBinder};
pub use object::{Bindable, FieldSetter, ObjectBinder};
pub use parameter::{ParameterSpec, SourceKind};
pub use types::{Arg, ConversionFailure, ExtractError, ParamType, ParamValue, TargetType};
