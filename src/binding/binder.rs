use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::{Arg, ConversionFailure, ParameterSpec, SourceKind, TargetType};
use crate::context::RequestContext;
use crate::error::ConfigError;
use crate::handler::HandlerDescriptor;

/// A resolved argument tagged with the parameter it came from.
#[derive(Debug)]
pub struct BoundArg {
    pub name: Arc<str>,
    pub arg: Arg,
}

/// Ordered resolved arguments, one per declared parameter.
pub type BoundArgs = Vec<BoundArg>;

/// Request-time binding failure. Resolved to `400 Bad Request`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("missing required parameter `{parameter}` ({target})")]
    MissingRequired { parameter: String, target: String },

    #[error("parameter `{parameter}`: cannot convert `{value}` to {target}: {reason}")]
    TypeConversion {
        parameter: String,
        value: String,
        target: String,
        reason: String,
    },
}

impl BindingError {
    /// Build a [`TypeConversion`](Self::TypeConversion) from a conversion failure.
    #[must_use]
    pub fn conversion(parameter: &str, target: &TargetType, failure: ConversionFailure) -> Self {
        BindingError::TypeConversion {
            parameter: parameter.to_string(),
            value: failure.value,
            target: target.to_string(),
            reason: failure.reason,
        }
    }

    /// Name of the parameter that failed to bind.
    #[must_use]
    pub fn parameter(&self) -> &str {
        match self {
            BindingError::MissingRequired { parameter, .. }
            | BindingError::TypeConversion { parameter, .. } => parameter,
        }
    }
}

/// Turns declared parameters into handler arguments.
///
/// Stateless; one instance is shared by every concurrent dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterBinder;

impl ParameterBinder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check a parameter list once, at registration.
    ///
    /// Rejects empty or duplicate names, targets that the declared source
    /// cannot produce, and defaults that do not convert to their target.
    pub fn validate(handler: &str, params: &[ParameterSpec]) -> Result<(), ConfigError> {
        let mut seen = HashSet::with_capacity(params.len());
        for (index, spec) in params.iter().enumerate() {
            if spec.name().is_empty() {
                return Err(ConfigError::MissingParameterName {
                    handler: handler.to_string(),
                    index,
                });
            }
            if !seen.insert(spec.name()) {
                return Err(ConfigError::DuplicateParameter {
                    handler: handler.to_string(),
                    parameter: spec.name().to_string(),
                });
            }
            let unsupported = |reason: &str| ConfigError::UnsupportedTarget {
                handler: handler.to_string(),
                parameter: spec.name().to_string(),
                target: spec.target().to_string(),
                reason: reason.to_string(),
            };
            match spec.kind() {
                SourceKind::ContextRequest | SourceKind::ContextResponse => {}
                SourceKind::NamedValue => {
                    if !spec.target().is_value_target() {
                        return Err(unsupported(
                            "named values must be text, primitive, enum or array of those",
                        ));
                    }
                    if let Some(default) = spec.default() {
                        if let Err(failure) = spec.target().convert(&[default]) {
                            return Err(ConfigError::InvalidDefault {
                                handler: handler.to_string(),
                                parameter: spec.name().to_string(),
                                default: default.to_string(),
                                reason: failure.reason,
                            });
                        }
                    }
                }
                SourceKind::BoundObject => {
                    let TargetType::Object(binder) = spec.target() else {
                        return Err(unsupported("bound objects need a Bindable struct target"));
                    };
                    for (key, field) in binder.fields() {
                        if !field.is_value_target() {
                            return Err(ConfigError::UnsupportedTarget {
                                handler: handler.to_string(),
                                parameter: format!("{}.{key}", spec.name()),
                                target: field.to_string(),
                                reason: "nested objects are not bound".to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve every declared parameter of `descriptor` against `ctx`.
    ///
    /// Stops at the first failing parameter; no partial result is returned.
    pub fn bind(
        &self,
        descriptor: &HandlerDescriptor,
        ctx: &RequestContext,
    ) -> Result<BoundArgs, BindingError> {
        let params = descriptor.params();
        let mut bound = Vec::with_capacity(params.len());
        for spec in params {
            let arg = match self.bind_one(spec, ctx) {
                Ok(arg) => arg,
                Err(err) => {
                    debug!(
                        handler = %descriptor.name(),
                        parameter = %spec.name(),
                        request_id = %ctx.request_id(),
                        error = %err,
                        "Parameter binding failed"
                    );
                    return Err(err);
                }
            };
            bound.push(BoundArg {
                name: spec.shared_name(),
                arg,
            });
        }
        Ok(bound)
    }

    fn bind_one(&self, spec: &ParameterSpec, ctx: &RequestContext) -> Result<Arg, BindingError> {
        match spec.kind() {
            SourceKind::ContextRequest => Ok(Arg::Request),
            SourceKind::ContextResponse => Ok(Arg::Response),
            SourceKind::NamedValue => {
                let target = spec.target();
                let raws = ctx.values(spec.name());
                if !raws.is_empty() {
                    return target
                        .convert(&raws)
                        .map(Arg::Value)
                        .map_err(|failure| BindingError::conversion(spec.name(), target, failure));
                }
                match spec.default() {
                    Some(default) => target
                        .convert(&[default])
                        .map(Arg::Value)
                        .map_err(|failure| BindingError::conversion(spec.name(), target, failure)),
                    None if spec.is_required() => Err(BindingError::MissingRequired {
                        parameter: spec.name().to_string(),
                        target: target.to_string(),
                    }),
                    None => Ok(Arg::Absent),
                }
            }
            SourceKind::BoundObject => match spec.target() {
                TargetType::Object(binder) => binder.bind(ctx).map(Arg::Object),
                other => {
                    // validate() rejects this at registration
                    warn!(parameter = %spec.name(), target = %other, "Non-object BoundObject target");
                    Err(BindingError::TypeConversion {
                        parameter: spec.name().to_string(),
                        value: String::new(),
                        target: other.to_string(),
                        reason: "not a bindable object".to_string(),
                    })
                }
            },
        }
    }
}
