//! Router core module - hot path for request routing.
//!
//! Lookups are two hash probes at most and never allocate on a hit.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use tracing::{debug, info, warn};

use crate::binding::ParameterBinder;
use crate::error::ConfigError;
use crate::handler::{Endpoint, HandlerDescriptor};

/// Which registration table a route lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTier {
    /// `(path, verb)` routes with declared parameters.
    Declarative,
    /// Path-only routes for fixed-shape handlers.
    Legacy,
}

impl fmt::Display for RouteTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTier::Declarative => f.write_str("declarative"),
            RouteTier::Legacy => f.write_str("legacy"),
        }
    }
}

/// Result of successfully matching a request to a registered handler.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub descriptor: Arc<HandlerDescriptor>,
    pub tier: RouteTier,
}

/// Why a lookup found no handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Neither tier knows the path.
    Miss,
    /// The declarative tier knows the path but not this verb.
    MethodMismatch { allowed: Vec<Method> },
}

/// One row of [`Router::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub tier: RouteTier,
    /// `None` for wildcard and legacy routes.
    pub verb: Option<Method>,
    pub pattern: Arc<str>,
    pub handler: Arc<str>,
}

/// Two-tier routing table.
///
/// The declarative tier is keyed by literal path and holds at most one
/// descriptor per verb, plus at most one wildcard. The legacy tier is keyed
/// by path alone. Within a tier the first registration wins; later
/// duplicates are logged and dropped.
#[derive(Default)]
pub struct Router {
    declarative: HashMap<Arc<str>, Vec<Arc<HandlerDescriptor>>>,
    legacy: HashMap<Arc<str>, Arc<HandlerDescriptor>>,
    /// Registration order, for introspection.
    order: Vec<(RouteTier, Arc<HandlerDescriptor>)>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declarative route.
    ///
    /// `verb` is case-insensitive; an empty string or `*` registers a
    /// wildcard that serves every verb without an exact entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a malformed pattern or verb, or when the
    /// endpoint's parameter list is invalid.
    pub fn register(
        &mut self,
        pattern: &str,
        verb: &str,
        endpoint: Endpoint,
    ) -> Result<Arc<HandlerDescriptor>, ConfigError> {
        validate_pattern(pattern)?;
        let verb = parse_verb(verb)?;
        ParameterBinder::validate(endpoint.name(), endpoint.parameters())?;

        let entries = self.declarative.entry(Arc::from(pattern)).or_default();
        if let Some(existing) = entries.iter().find(|d| d.verb() == verb.as_ref()) {
            warn!(
                pattern = %pattern,
                verb = %verb_label(verb.as_ref()),
                kept_handler = %existing.name(),
                rejected_handler = %endpoint.name(),
                "Duplicate route rejected, first registration wins"
            );
            return Ok(Arc::clone(existing));
        }

        let descriptor = Arc::new(endpoint.into_descriptor(pattern, verb));
        entries.push(Arc::clone(&descriptor));
        self.order
            .push((RouteTier::Declarative, Arc::clone(&descriptor)));

        debug!(
            pattern = %pattern,
            verb = %verb_label(descriptor.verb()),
            handler_name = %descriptor.name(),
            owner = ?descriptor.owner(),
            params = descriptor.params().len(),
            "Declarative route registered"
        );
        Ok(descriptor)
    }

    /// Register a path-only route for a legacy handler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a malformed path, a declarative handler,
    /// or an endpoint that declares parameters.
    pub fn register_legacy(
        &mut self,
        path: &str,
        endpoint: Endpoint,
    ) -> Result<Arc<HandlerDescriptor>, ConfigError> {
        validate_pattern(path)?;
        if !endpoint.handler().is_legacy() {
            return Err(ConfigError::LegacyShape {
                path: path.to_string(),
                handler: endpoint.name().to_string(),
            });
        }
        if !endpoint.parameters().is_empty() {
            return Err(ConfigError::LegacyParameters {
                handler: endpoint.name().to_string(),
            });
        }

        if let Some(existing) = self.legacy.get(path) {
            warn!(
                path = %path,
                kept_handler = %existing.name(),
                rejected_handler = %endpoint.name(),
                "Duplicate legacy route rejected, first registration wins"
            );
            return Ok(Arc::clone(existing));
        }

        let descriptor = Arc::new(endpoint.into_descriptor(path, None));
        self.legacy.insert(Arc::from(path), Arc::clone(&descriptor));
        self.order.push((RouteTier::Legacy, Arc::clone(&descriptor)));

        debug!(
            path = %path,
            handler_name = %descriptor.name(),
            "Legacy route registered"
        );
        Ok(descriptor)
    }

    /// Resolve a request path and verb to one descriptor.
    ///
    /// Exact verb beats wildcard. A declarative path with no matching verb is
    /// a [`LookupError::MethodMismatch`] and never falls through to the
    /// legacy tier.
    pub fn lookup(&self, path: &str, method: &Method) -> Result<RouteMatch, LookupError> {
        let match_start = Instant::now();

        if let Some(entries) = self.declarative.get(path) {
            let hit = entries
                .iter()
                .find(|d| d.verb() == Some(method))
                .or_else(|| entries.iter().find(|d| d.verb().is_none()));

            return match hit {
                Some(descriptor) => {
                    info!(
                        method = %method,
                        path = %path,
                        handler_name = %descriptor.name(),
                        tier = "declarative",
                        wildcard = descriptor.verb().is_none(),
                        duration_us = match_start.elapsed().as_micros(),
                        "Route matched"
                    );
                    Ok(RouteMatch {
                        descriptor: Arc::clone(descriptor),
                        tier: RouteTier::Declarative,
                    })
                }
                None => {
                    let allowed: Vec<Method> =
                        entries.iter().filter_map(|d| d.verb().cloned()).collect();
                    warn!(
                        method = %method,
                        path = %path,
                        allowed = ?allowed,
                        "Path matched but verb did not"
                    );
                    Err(LookupError::MethodMismatch { allowed })
                }
            };
        }

        if let Some(descriptor) = self.legacy.get(path) {
            info!(
                method = %method,
                path = %path,
                handler_name = %descriptor.name(),
                tier = "legacy",
                duration_us = match_start.elapsed().as_micros(),
                "Route matched"
            );
            return Ok(RouteMatch {
                descriptor: Arc::clone(descriptor),
                tier: RouteTier::Legacy,
            });
        }

        warn!(
            method = %method,
            path = %path,
            duration_us = match_start.elapsed().as_micros(),
            "No route matched"
        );
        Err(LookupError::Miss)
    }

    /// Every stored route in registration order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.order
            .iter()
            .map(|(tier, d)| RouteInfo {
                tier: *tier,
                verb: d.verb().cloned(),
                pattern: Arc::from(d.pattern()),
                handler: d.shared_name(),
            })
            .collect()
    }

    /// Every stored descriptor in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<HandlerDescriptor>> {
        self.order.iter().map(|(_, d)| d)
    }

    /// Log every registered route at info level.
    pub fn dump_routes(&self) {
        info!(
            declarative = self.declarative.values().map(Vec::len).sum::<usize>(),
            legacy = self.legacy.len(),
            "Routing table"
        );
        for (tier, d) in &self.order {
            info!(
                tier = %tier,
                verb = %verb_label(d.verb()),
                pattern = %d.pattern(),
                handler_name = %d.name(),
                "Route"
            );
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes())
            .finish()
    }
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    let reason = if pattern.is_empty() {
        "pattern is empty"
    } else if !pattern.starts_with('/') {
        "pattern must start with `/`"
    } else if pattern.chars().any(char::is_whitespace) {
        "pattern contains whitespace"
    } else if pattern.contains('?') {
        "pattern must not contain a query string"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    })
}

fn parse_verb(verb: &str) -> Result<Option<Method>, ConfigError> {
    let trimmed = verb.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok(None);
    }
    Method::from_bytes(trimmed.to_ascii_uppercase().as_bytes())
        .map(Some)
        .map_err(|_| ConfigError::InvalidVerb {
            verb: verb.to_string(),
        })
}

pub(crate) fn verb_label(verb: Option<&Method>) -> &str {
    verb.map_or("*", Method::as_str)
}
