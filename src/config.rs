//! # Dispatch Configuration Module
//!
//! Tunables for [`DispatchCore`](crate::dispatcher::DispatchCore), loaded
//! from environment variables or a YAML document.
//!
//! ## Environment Variables
//!
//! ### `BRRTD_EXPOSE_ERROR_DETAILS`
//!
//! `true`/`1` includes the error message in `5xx` problem bodies. Client
//! errors (`4xx`) always carry their detail. Default: `false`.
//!
//! ### `BRRTD_SLOW_HANDLER_MS`
//!
//! Handlers that take longer than this are logged at warn level. Nothing is
//! cancelled. Default: `1000`.
//!
//! ### `BRRTD_REQUEST_ID_HEADER`
//!
//! Header an inbound request id is taken from. Default: `x-request-id`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtdispatch::config::DispatchConfig;
//!
//! let config = DispatchConfig::from_yaml_str("slow_handler_ms: 250").unwrap();
//! assert_eq!(config.slow_handler_ms, 250);
//! assert!(!config.expose_error_details);
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Dispatch tunables. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub expose_error_details: bool,
    pub slow_handler_ms: u64,
    pub request_id_header: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            expose_error_details: false,
            slow_handler_ms: 1000,
            request_id_header: crate::context::DEFAULT_REQUEST_ID_HEADER.to_string(),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to the default for that field.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let expose_error_details = env::var("BRRTD_EXPOSE_ERROR_DETAILS")
            .ok()
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.expose_error_details);
        let slow_handler_ms = env::var("BRRTD_SLOW_HANDLER_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.slow_handler_ms);
        let request_id_header = env::var("BRRTD_REQUEST_ID_HEADER")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.request_id_header);
        Self {
            expose_error_details,
            slow_handler_ms,
            request_id_header,
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid dispatch configuration")
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading dispatch configuration {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("parsing dispatch configuration {}", path.display()))
    }

    #[must_use]
    pub fn slow_handler_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_handler_ms)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
