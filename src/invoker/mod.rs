//! # Invoker Module
//!
//! Strategies for calling a handler once its arguments are bound.
//!
//! An [`AdapterSelector`] holds an ordered list of [`Invoker`]s and uses the
//! first one whose [`supports`](Invoker::supports) accepts the descriptor.
//! The default list covers both handler shapes, so a selector built with
//! [`AdapterSelector::default`] never reports a missing invoker. Custom
//! invokers can be pushed in front to wrap or replace either strategy.

mod core;

pub use core::{AdapterSelector, DeclarativeInvoker, Invoker, LegacyInvoker};
