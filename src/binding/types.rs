use std::any::{type_name, Any};
use std::fmt;

use thiserror::Error;

use super::ObjectBinder;

/// Closed set of conversion targets a parameter (or object field) can declare.
///
/// The tag is fixed when the handler is registered; request-time binding is a
/// lookup plus a string conversion, never type inspection.
#[derive(Clone)]
pub enum TargetType {
    Text,
    Char,
    Boolean,
    Signed {
        name: &'static str,
        min: i64,
        max: i64,
    },
    Unsigned {
        name: &'static str,
        max: u64,
    },
    Float {
        name: &'static str,
    },
    Enum {
        name: &'static str,
        variants: &'static [&'static str],
    },
    Array(Box<TargetType>),
    Object(ObjectBinder),
}

/// A raw value that could not be converted to its declared [`TargetType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub value: String,
    pub reason: String,
}

fn failure(value: &str, reason: impl Into<String>) -> ConversionFailure {
    ConversionFailure {
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl TargetType {
    /// Tag for a struct implementing [`Bindable`](super::Bindable).
    #[must_use]
    pub fn object<T: super::Bindable>() -> Self {
        TargetType::Object(ObjectBinder::of::<T>())
    }

    /// Primitive, string, array and enum targets are read from named values;
    /// everything else is bound field by field.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, TargetType::Object(_))
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, TargetType::Array(_))
    }

    /// True when nothing inside this tag needs an object or a nested array,
    /// which is everything a single request key can carry.
    #[must_use]
    pub fn is_value_target(&self) -> bool {
        match self {
            TargetType::Object(_) => false,
            TargetType::Array(inner) => !inner.is_object() && !inner.is_array(),
            _ => true,
        }
    }

    /// Convert every raw value supplied for one key.
    ///
    /// Scalars use the last occurrence. Arrays take every occurrence and
    /// additionally split each one on `,` (form style), skipping empty items.
    pub fn convert(&self, raws: &[&str]) -> Result<ParamValue, ConversionFailure> {
        match self {
            TargetType::Array(inner) => {
                let mut items = Vec::with_capacity(raws.len());
                for raw in raws {
                    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                        items.push(inner.convert_one(part)?);
                    }
                }
                Ok(ParamValue::List(items))
            }
            _ => match raws.last() {
                Some(raw) => self.convert_one(raw),
                None => Err(failure("", "no value supplied")),
            },
        }
    }

    /// Convert a single raw string.
    pub fn convert_one(&self, raw: &str) -> Result<ParamValue, ConversionFailure> {
        match self {
            TargetType::Text => Ok(ParamValue::Text(raw.to_string())),
            TargetType::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(ParamValue::Char(c)),
                    _ => Err(failure(raw, "expected exactly one character")),
                }
            }
            TargetType::Boolean => parse_bool(raw.trim())
                .map(ParamValue::Bool)
                .ok_or_else(|| failure(raw, "expected true/false, on/off, yes/no or 1/0")),
            TargetType::Signed { min, max, .. } => {
                let v = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| failure(raw, e.to_string()))?;
                if v < *min || v > *max {
                    return Err(failure(raw, format!("must be between {min} and {max}")));
                }
                Ok(ParamValue::Int(v))
            }
            TargetType::Unsigned { max, .. } => {
                let v = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| failure(raw, e.to_string()))?;
                if v > *max {
                    return Err(failure(raw, format!("must be at most {max}")));
                }
                Ok(ParamValue::UInt(v))
            }
            TargetType::Float { .. } => raw
                .trim()
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|e| failure(raw, e.to_string())),
            TargetType::Enum { variants, .. } => {
                let wanted = raw.trim();
                variants
                    .iter()
                    .find(|v| **v == wanted)
                    .map(|v| ParamValue::Variant(*v))
                    .ok_or_else(|| failure(raw, format!("expected one of: {}", variants.join(", "))))
            }
            TargetType::Array(_) => Err(failure(raw, "nested arrays are not supported")),
            TargetType::Object(binder) => Err(failure(
                raw,
                format!("{} cannot be read from a single value", binder.type_name()),
            )),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Text => f.write_str("string"),
            TargetType::Char => f.write_str("char"),
            TargetType::Boolean => f.write_str("bool"),
            TargetType::Signed { name, .. }
            | TargetType::Unsigned { name, .. }
            | TargetType::Float { name }
            | TargetType::Enum { name, .. } => f.write_str(name),
            TargetType::Array(inner) => write!(f, "array of {inner}"),
            TargetType::Object(binder) => f.write_str(binder.type_name()),
        }
    }
}

impl fmt::Debug for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetType({self})")
    }
}

/// A converted named value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Char(char),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Canonical variant name of an enum target.
    Variant(&'static str),
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn describe(&self) -> &'static str {
        match self {
            ParamValue::Text(_) => "string",
            ParamValue::Char(_) => "char",
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "signed integer",
            ParamValue::UInt(_) => "unsigned integer",
            ParamValue::Float(_) => "float",
            ParamValue::Variant(_) => "enum variant",
            ParamValue::List(_) => "array",
        }
    }
}

/// One resolved handler argument.
pub enum Arg {
    /// Marker for a `ContextRequest` parameter; read it with `Args::request`.
    Request,
    /// Marker for a `ContextResponse` parameter; use `Args::response`.
    Response,
    /// Optional named value that was not supplied and has no default.
    Absent,
    Value(ParamValue),
    Object(Box<dyn Any + Send>),
    /// Already moved out by the handler.
    Taken,
}

impl Arg {
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Arg::Request => "request context",
            Arg::Response => "response sink",
            Arg::Absent => "absent value",
            Arg::Value(v) => v.describe(),
            Arg::Object(_) => "bound object",
            Arg::Taken => "taken argument",
        }
    }

    /// Move a bound object out, checking its concrete type.
    pub fn into_object<T: 'static>(self) -> Result<T, ExtractError> {
        match self {
            Arg::Object(boxed) => boxed
                .downcast::<T>()
                .map(|b| *b)
                .map_err(|_| ExtractError::Mismatch {
                    expected: type_name::<T>().to_string(),
                    found: "object of another type",
                }),
            other => Err(other.mismatch(type_name::<T>())),
        }
    }

    /// Canonical name of a bound enum variant.
    pub fn into_variant(self) -> Result<&'static str, ExtractError> {
        match self {
            Arg::Value(ParamValue::Variant(v)) => Ok(v),
            Arg::Value(ParamValue::Text(_)) => Err(ExtractError::Mismatch {
                expected: "enum variant".to_string(),
                found: "string",
            }),
            other => Err(other.mismatch("enum variant")),
        }
    }

    #[must_use]
    pub fn mismatch(&self, expected: &str) -> ExtractError {
        match self {
            Arg::Absent => ExtractError::Absent,
            Arg::Taken => ExtractError::Taken,
            other => ExtractError::Mismatch {
                expected: expected.to_string(),
                found: other.describe(),
            },
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Request => f.write_str("Request"),
            Arg::Response => f.write_str("Response"),
            Arg::Absent => f.write_str("Absent"),
            Arg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Arg::Object(_) => f.write_str("Object(..)"),
            Arg::Taken => f.write_str("Taken"),
        }
    }
}

/// Failure to turn a bound [`Arg`] into the Rust type a handler asked for.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no value was bound")]
    Absent,
    #[error("argument was already taken")]
    Taken,
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: String,
        found: &'static str,
    },
    #[error("value {value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("`{value}` is not a variant of {target}")]
    UnknownVariant { value: String, target: &'static str },
}

/// Rust types a parameter or object field can be declared as.
///
/// Implemented here for strings, chars, booleans, every std integer width,
/// floats, `Option<T>` and `Vec<T>`; `#[derive(ParamEnum)]` and
/// `#[derive(Bindable)]` implement it for enums and structs.
pub trait ParamType: Sized + 'static {
    fn target_type() -> TargetType;

    fn from_arg(arg: Arg) -> Result<Self, ExtractError>;

    /// Optional parameters default to `required = false`.
    fn is_optional() -> bool {
        false
    }
}

impl ParamType for String {
    fn target_type() -> TargetType {
        TargetType::Text
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Value(ParamValue::Text(s)) => Ok(s),
            Arg::Value(ParamValue::Variant(v)) => Ok(v.to_string()),
            other => Err(other.mismatch("string")),
        }
    }
}

impl ParamType for char {
    fn target_type() -> TargetType {
        TargetType::Char
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Value(ParamValue::Char(c)) => Ok(c),
            other => Err(other.mismatch("char")),
        }
    }
}

impl ParamType for bool {
    fn target_type() -> TargetType {
        TargetType::Boolean
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Value(ParamValue::Bool(b)) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl ParamType for $t {
            fn target_type() -> TargetType {
                TargetType::Signed {
                    name: stringify!($t),
                    min: <$t>::MIN as i64,
                    max: <$t>::MAX as i64,
                }
            }

            fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
                match arg {
                    Arg::Value(ParamValue::Int(v)) => <$t>::try_from(v).map_err(|_| {
                        ExtractError::OutOfRange { value: v.to_string(), target: stringify!($t) }
                    }),
                    other => Err(other.mismatch(stringify!($t))),
                }
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl ParamType for $t {
            fn target_type() -> TargetType {
                TargetType::Unsigned {
                    name: stringify!($t),
                    max: <$t>::MAX as u64,
                }
            }

            fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
                match arg {
                    Arg::Value(ParamValue::UInt(v)) => <$t>::try_from(v).map_err(|_| {
                        ExtractError::OutOfRange { value: v.to_string(), target: stringify!($t) }
                    }),
                    other => Err(other.mismatch(stringify!($t))),
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

impl ParamType for f64 {
    fn target_type() -> TargetType {
        TargetType::Float { name: "f64" }
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Value(ParamValue::Float(v)) => Ok(v),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl ParamType for f32 {
    fn target_type() -> TargetType {
        TargetType::Float { name: "f32" }
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Value(ParamValue::Float(v)) => {
                if v.is_finite() && (v < f64::from(f32::MIN) || v > f64::from(f32::MAX)) {
                    return Err(ExtractError::OutOfRange {
                        value: v.to_string(),
                        target: "f32",
                    });
                }
                Ok(v as f32)
            }
            other => Err(other.mismatch("f32")),
        }
    }
}

impl<T: ParamType> ParamType for Option<T> {
    fn target_type() -> TargetType {
        T::target_type()
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Absent => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }

    fn is_optional() -> bool {
        true
    }
}

impl<T: ParamType> ParamType for Vec<T> {
    fn target_type() -> TargetType {
        TargetType::Array(Box::new(T::target_type()))
    }

    fn from_arg(arg: Arg) -> Result<Self, ExtractError> {
        match arg {
            Arg::Value(ParamValue::List(items)) => items
                .into_iter()
                .map(|item| T::from_arg(Arg::Value(item)))
                .collect(),
            other => Err(other.mismatch("array")),
        }
    }
}
