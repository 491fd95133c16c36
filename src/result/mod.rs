//! # Result Module
//!
//! Normalizes what a handler returned and hands views to a [`Renderer`].
//!
//! A [`HandlerReturn::View`](crate::handler::HandlerReturn::View) becomes
//! [`DispatchResult::View`]; `Written` and `Nothing` become
//! [`DispatchResult::Direct`] and rendering is skipped. Concrete template
//! engines live outside this crate; [`JsonRenderer`] serializes the model.

mod core;
mod render;

pub use core::{DispatchResult, RenderError, ResultDispatcher, ViewResult};
pub use render::{JsonRenderer, Renderer};
