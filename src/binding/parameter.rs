use std::fmt;
use std::sync::Arc;

use super::{Bindable, ParamType, TargetType};

/// Where a handler parameter gets its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// The [`RequestContext`](crate::context::RequestContext) itself.
    ContextRequest,
    /// The [`ResponseSink`](crate::context::ResponseSink) itself.
    ContextResponse,
    /// One request key, converted to the declared target type.
    NamedValue,
    /// A struct assembled from several request keys.
    BoundObject,
}

impl SourceKind {
    /// Strategy implied by a target tag: objects are bound field by field,
    /// everything else is a single named value.
    #[must_use]
    pub fn infer(target: &TargetType) -> Self {
        if target.is_object() {
            SourceKind::BoundObject
        } else {
            SourceKind::NamedValue
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::ContextRequest => write!(f, "ContextRequest"),
            SourceKind::ContextResponse => write!(f, "ContextResponse"),
            SourceKind::NamedValue => write!(f, "NamedValue"),
            SourceKind::BoundObject => write!(f, "BoundObject"),
        }
    }
}

/// Declaration of one handler parameter.
///
/// Built once at registration and never changed. Named values are required
/// unless declared as `Option<T>`, marked with [`optional`](Self::optional),
/// or given a [`default_value`](Self::default_value).
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    kind: SourceKind,
    name: Arc<str>,
    required: bool,
    default: Option<String>,
    target: TargetType,
}

impl ParameterSpec {
    /// Fully explicit constructor; prefer the typed helpers below.
    #[must_use]
    pub fn new(kind: SourceKind, name: &str, target: TargetType) -> Self {
        let required = matches!(kind, SourceKind::NamedValue);
        Self {
            kind,
            name: Arc::from(name),
            required,
            default: None,
            target,
        }
    }

    /// Inject the request context.
    #[must_use]
    pub fn request(name: &str) -> Self {
        Self::new(SourceKind::ContextRequest, name, TargetType::Text)
    }

    /// Inject the response sink.
    #[must_use]
    pub fn response(name: &str) -> Self {
        Self::new(SourceKind::ContextResponse, name, TargetType::Text)
    }

    /// Named value converted to `T`.
    #[must_use]
    pub fn named<T: ParamType>(name: &str) -> Self {
        let mut spec = Self::new(SourceKind::NamedValue, name, T::target_type());
        spec.required = !T::is_optional();
        spec
    }

    /// Struct of type `T` bound from request keys.
    #[must_use]
    pub fn object<T: Bindable>(name: &str) -> Self {
        Self::new(SourceKind::BoundObject, name, TargetType::object::<T>())
    }

    /// Pick `NamedValue` or `BoundObject` from `T`'s target tag.
    #[must_use]
    pub fn infer<T: ParamType>(name: &str) -> Self {
        let target = T::target_type();
        let mut spec = Self::new(SourceKind::infer(&target), name, target);
        spec.required = spec.kind == SourceKind::NamedValue && !T::is_optional();
        spec
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Fallback used when the key is absent. An empty string means no default.
    #[must_use]
    pub fn default_value(mut self, value: &str) -> Self {
        self.default = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    #[must_use]
    pub fn target(&self) -> &TargetType {
        &self.target
    }
}
