//! Subscriber setup for the shell that embeds a [`DispatchCore`].
//!
//! The core emits `tracing` events and never installs a subscriber itself.
//! Call [`init_logging_with_config`] once at startup. Every knob can come
//! from a `BRRTD_LOG_*` variable:
//!
//! | Variable | Default | |
//! |----------|---------|-|
//! | `BRRTD_LOG_LEVEL` | `info` | base level when `RUST_LOG` is unset |
//! | `BRRTD_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BRRTD_LOG_SAMPLING_MODE` | `all` | `all`, `error-only` or `sampled` |
//! | `BRRTD_LOG_SAMPLING_RATE` | `0.1` | share of sub-WARN events kept when sampled |
//! | `BRRTD_LOG_ASYNC` | `true` | write through a `tracing-appender` worker |
//! | `BRRTD_LOG_BUFFER_SIZE` | `8192` | lines queued before the worker blocks |
//! | `BRRTD_LOG_TARGET_FILTER` | unset | extra directives, e.g. `brrtdispatch::router=debug` |
//! | `BRRTD_LOG_INCLUDE_LOCATION` | `false` | file and line in every record |
//!
//! [`DispatchCore`]: crate::DispatchCore

use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tracing::{warn, Level, Metadata, Subscriber};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Anything but `pretty` selects JSON.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("pretty") {
            Self::Pretty
        } else {
            Self::Json
        })
    }
}

/// Which events survive the sampling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// WARN and ERROR only.
    ErrorOnly,
    /// Every WARN, ERROR and span; a fixed share of everything else.
    Sampled,
}

impl FromStr for SamplingMode {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to `Sampled`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "error-only" | "error_only" => Self::ErrorOnly,
            _ => Self::Sampled,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: Level,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    pub sampling_rate: f64,
    pub async_logging: bool,
    pub buffer_size: usize,
    /// Comma-separated `EnvFilter` directives added on top of the level.
    pub target_filter: Option<String>,
    pub include_location: bool,
}

/// Read `key` and parse it, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let prod = Self::default_prod();
        Self {
            log_level: env_or("BRRTD_LOG_LEVEL", prod.log_level),
            format: env_or("BRRTD_LOG_FORMAT", prod.format),
            sampling_mode: env_or("BRRTD_LOG_SAMPLING_MODE", SamplingMode::All),
            sampling_rate: env_or("BRRTD_LOG_SAMPLING_RATE", prod.sampling_rate),
            async_logging: env_or("BRRTD_LOG_ASYNC", prod.async_logging),
            buffer_size: env_or("BRRTD_LOG_BUFFER_SIZE", prod.buffer_size),
            target_filter: env::var("BRRTD_LOG_TARGET_FILTER").ok(),
            include_location: env_or("BRRTD_LOG_INCLUDE_LOCATION", prod.include_location),
        }
    }

    /// Debug level, pretty, synchronous, with locations.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: Level::DEBUG,
            format: LogFormat::Pretty,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            buffer_size: 1024,
            target_filter: None,
            include_location: true,
        }
    }

    /// Info level, JSON, sampled at 10%, non-blocking.
    #[must_use]
    pub fn default_prod() -> Self {
        Self {
            log_level: Level::INFO,
            format: LogFormat::Json,
            sampling_mode: SamplingMode::Sampled,
            sampling_rate: 0.1,
            async_logging: true,
            buffer_size: 8192,
            target_filter: None,
            include_location: false,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }
}

/// Drops a share of low-level events.
///
/// In `Sampled` mode one event in every `1 / rate` below WARN is kept, counted
/// across all threads. A rate of zero keeps none of them.
#[derive(Debug)]
pub struct SamplingLayer {
    mode: SamplingMode,
    keep_every: Option<u64>,
    seen: AtomicU64,
}

impl SamplingLayer {
    #[must_use]
    pub fn new(mode: SamplingMode, rate: f64) -> Self {
        let rate = rate.clamp(0.0, 1.0);
        let keep_every = (rate > 0.0).then(|| (1.0 / rate).round().max(1.0) as u64);
        Self {
            mode,
            keep_every,
            seen: AtomicU64::new(0),
        }
    }

    fn keeps(&self, metadata: &Metadata<'_>) -> bool {
        let severe = *metadata.level() <= Level::WARN;
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => severe,
            SamplingMode::Sampled if severe || metadata.is_span() => true,
            SamplingMode::Sampled => self.keep_every.is_some_and(|every| {
                self.seen.fetch_add(1, Ordering::Relaxed) % every == 0
            }),
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.keeps(metadata)
    }
}

/// Keeps the background writer alive; drop it at shutdown to flush.
#[must_use = "dropping the guard stops the background log writer"]
#[derive(Debug)]
pub struct LogGuard(Option<WorkerGuard>);

/// `RUST_LOG` wins over the configured level. Target directives are layered
/// on either way; the ones that fail to parse are returned.
fn build_filter(config: &LogConfig) -> (EnvFilter, Vec<String>) {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let mut rejected = Vec::new();

    let directives = config.target_filter.as_deref().unwrap_or_default();
    for raw in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match raw.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => rejected.push(raw.to_string()),
        }
    }
    (filter, rejected)
}

fn make_writer(config: &LogConfig) -> (BoxMakeWriter, Option<WorkerGuard>) {
    if !config.async_logging {
        return (BoxMakeWriter::new(std::io::stdout), None);
    }
    let (writer, guard) = NonBlockingBuilder::default()
        .buffered_lines_limit(config.buffer_size.max(1))
        .finish(std::io::stdout());
    (BoxMakeWriter::new(writer), Some(guard))
}

/// Install the global subscriber at `level`, everything else from the
/// environment.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_logging(level: Level) -> Result<LogGuard> {
    init_logging_with_config(&LogConfig::from_env().with_level(level))
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_logging_with_config(config: &LogConfig) -> Result<LogGuard> {
    let (filter, rejected) = build_filter(config);
    let (writer, guard) = make_writer(config);
    let location = config.include_location;

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_thread_ids(true)
            .with_file(location)
            .with_line_number(location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(location)
            .with_line_number(location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate))
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    for directive in rejected {
        warn!(directive = %directive, "Ignoring invalid log filter directive");
    }
    Ok(LogGuard(guard))
}
