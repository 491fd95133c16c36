use std::mem;

use thiserror::Error;

use super::{Arg, Bindable, BoundArg, BoundArgs, ExtractError, ParamType};
use crate::context::{RequestContext, ResponseSink};

/// Failure to read a bound argument inside a declarative handler.
///
/// Converts into `anyhow::Error`, so handlers can use `?` directly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("handler has no parameter named `{parameter}`")]
    Unknown { parameter: String },

    #[error("parameter `{parameter}`: {source}")]
    Extract {
        parameter: String,
        #[source]
        source: ExtractError,
    },
}

/// Arguments handed to a declarative handler.
///
/// Values are moved out with [`take`](Self::take); the request context and
/// response sink are always reachable regardless of which parameters were
/// declared for them.
pub struct Args<'a> {
    ctx: &'a RequestContext,
    res: &'a mut dyn ResponseSink,
    slots: BoundArgs,
}

impl<'a> Args<'a> {
    #[must_use]
    pub fn new(ctx: &'a RequestContext, res: &'a mut dyn ResponseSink, slots: BoundArgs) -> Self {
        Self { ctx, res, slots }
    }

    #[inline]
    #[must_use]
    pub fn request(&self) -> &'a RequestContext {
        self.ctx
    }

    #[inline]
    pub fn response(&mut self) -> &mut dyn ResponseSink {
        &mut *self.res
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_ref())
    }

    /// Borrow a bound argument without consuming it.
    #[must_use]
    pub fn peek(&self, name: &str) -> Option<&Arg> {
        self.slots
            .iter()
            .find(|s| s.name.as_ref() == name)
            .map(|s| &s.arg)
    }

    /// Move the argument bound for `name` out as `T`.
    pub fn take<T: ParamType>(&mut self, name: &str) -> Result<T, ArgumentError> {
        let arg = self.take_raw(name)?;
        T::from_arg(arg).map_err(|source| ArgumentError::Extract {
            parameter: name.to_string(),
            source,
        })
    }

    /// Move the argument at declaration position `index` out as `T`.
    pub fn take_at<T: ParamType>(&mut self, index: usize) -> Result<T, ArgumentError> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(ArgumentError::Unknown {
                parameter: format!("#{index}"),
            });
        };
        let arg = mem::replace(&mut slot.arg, Arg::Taken);
        T::from_arg(arg).map_err(|source| ArgumentError::Extract {
            parameter: slot.name.to_string(),
            source,
        })
    }

    /// Move a bound object out.
    pub fn take_object<T: Bindable>(&mut self, name: &str) -> Result<T, ArgumentError> {
        let arg = self.take_raw(name)?;
        arg.into_object::<T>()
            .map_err(|source| ArgumentError::Extract {
                parameter: name.to_string(),
                source,
            })
    }

    fn take_raw(&mut self, name: &str) -> Result<Arg, ArgumentError> {
        let slot: &mut BoundArg = self
            .slots
            .iter_mut()
            .find(|s| s.name.as_ref() == name)
            .ok_or_else(|| ArgumentError::Unknown {
                parameter: name.to_string(),
            })?;
        Ok(mem::replace(&mut slot.arg, Arg::Taken))
    }
}
