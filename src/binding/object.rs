use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Arg, BindingError, ExtractError, TargetType};
use crate::context::RequestContext;

/// One entry of a type's field-to-setter table.
///
/// `key` is the request key the field is read from, `target` yields the
/// field's conversion tag and `assign` stores a converted value.
pub struct FieldSetter<T> {
    pub key: &'static str,
    pub target: fn() -> TargetType,
    pub assign: fn(&mut T, Arg) -> Result<(), ExtractError>,
}

/// A struct that can be populated field by field from named values.
///
/// Binding starts from `Default::default()` and applies the setter of every
/// field whose key is present in the request. The table is usually generated
/// with `#[derive(Bindable)]` but can be written by hand:
///
/// ```rust
/// use brrtdispatch::binding::{Arg, Bindable, ExtractError, FieldSetter, ParamType, TargetType};
///
/// #[derive(Default)]
/// struct Paging {
///     limit: u32,
/// }
///
/// fn assign_limit(p: &mut Paging, arg: Arg) -> Result<(), ExtractError> {
///     p.limit = u32::from_arg(arg)?;
///     Ok(())
/// }
///
/// impl Bindable for Paging {
///     fn field_setters() -> &'static [FieldSetter<Self>] {
///         const SETTERS: &[FieldSetter<Paging>] = &[FieldSetter {
///             key: "limit",
///             target: <u32 as ParamType>::target_type,
///             assign: assign_limit,
///         }];
///         SETTERS
///     }
/// }
///
/// assert_eq!(Paging::field_setters()[0].key, "limit");
/// ```
pub trait Bindable: Default + Send + 'static {
    fn field_setters() -> &'static [FieldSetter<Self>];
}

trait ErasedObject: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn fields(&self) -> Vec<(&'static str, TargetType)>;
    fn bind(&self, ctx: &RequestContext) -> Result<Box<dyn Any + Send>, BindingError>;
}

struct TypedObject<T>(PhantomData<fn() -> T>);

impl<T: Bindable> ErasedObject for TypedObject<T> {
    fn type_name(&self) -> &'static str {
        short_type_name::<T>()
    }

    fn fields(&self) -> Vec<(&'static str, TargetType)> {
        T::field_setters()
            .iter()
            .map(|s| (s.key, (s.target)()))
            .collect()
    }

    fn bind(&self, ctx: &RequestContext) -> Result<Box<dyn Any + Send>, BindingError> {
        let mut object = T::default();
        for setter in T::field_setters() {
            let raws = ctx.values(setter.key);
            if raws.is_empty() {
                continue;
            }
            let target = (setter.target)();
            let value = target
                .convert(&raws)
                .map_err(|failure| BindingError::conversion(setter.key, &target, failure))?;
            (setter.assign)(&mut object, Arg::Value(value)).map_err(|e| {
                BindingError::TypeConversion {
                    parameter: setter.key.to_string(),
                    value: raws.join(","),
                    target: target.to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(Box::new(object))
    }
}

/// Type-erased handle to a [`Bindable`] type, stored in [`TargetType::Object`].
#[derive(Clone)]
pub struct ObjectBinder(Arc<dyn ErasedObject>);

impl ObjectBinder {
    #[must_use]
    pub fn of<T: Bindable>() -> Self {
        ObjectBinder(Arc::new(TypedObject::<T>(PhantomData)))
    }

    /// Unqualified name of the bound type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Request keys and conversion tags of every settable field.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, TargetType)> {
        self.0.fields()
    }

    /// Build a zero-value instance and assign every field present in `ctx`.
    pub fn bind(&self, ctx: &RequestContext) -> Result<Box<dyn Any + Send>, BindingError> {
        self.0.bind(ctx)
    }
}

impl fmt::Debug for ObjectBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectBinder").field(&self.type_name()).finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    // Generic arguments may contain `::` themselves; only trim the outer path.
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
