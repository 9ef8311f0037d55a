//! Pipeline configuration from environment variables

use super::source::tick_period;
use std::env;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW_SEC: f64 = 5.0;
pub const DEFAULT_TTL_SEC: f64 = 60.0;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_SOURCE_RATE_HZ: f64 = 20.0;

/// Shorter windows would spin the aggregator on empty windows
pub const MIN_WINDOW_SEC: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the trend pipeline
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Tumbling window length in seconds
    pub window_sec: f64,

    /// How long a single tag occurrence keeps counting towards trends
    pub ttl_sec: f64,

    /// Number of trending tags reported per window
    pub k: usize,

    /// Parallel tag extraction workers
    pub n_workers: usize,

    /// Capacity of both the ingestion and the event queue
    pub queue_capacity: usize,

    /// Posts per second emitted by the simulated source
    pub source_rate_hz: f64,

    /// Append summaries as JSON lines to this file
    pub jsonl_path: Option<String>,

    /// Store summaries in this SQLite database
    pub sqlite_path: Option<String>,

    /// Stop after this many seconds (None = run until CTRL+C)
    pub run_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_sec: DEFAULT_WINDOW_SEC,
            ttl_sec: DEFAULT_TTL_SEC,
            k: DEFAULT_TOP_K,
            n_workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            source_rate_hz: DEFAULT_SOURCE_RATE_HZ,
            jsonl_path: None,
            sqlite_path: None,
            run_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TRENDS_WINDOW_SEC` (default: 5)
    /// - `TRENDS_TTL_SEC` (default: 60)
    /// - `TRENDS_TOP_K` (default: 5)
    /// - `TRENDS_WORKERS` (default: 4)
    /// - `TRENDS_QUEUE_CAPACITY` (default: 10000)
    /// - `TRENDS_SOURCE_RATE_HZ` (default: 20)
    /// - `TRENDS_JSONL_PATH` (default: unset)
    /// - `TRENDS_SQLITE_PATH` (default: unset)
    /// - `TRENDS_RUN_SECS` (default: unset, run until CTRL+C)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Values that fail to parse fall back to their default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            window_sec: parse_or(&lookup, "TRENDS_WINDOW_SEC", defaults.window_sec),
            ttl_sec: parse_or(&lookup, "TRENDS_TTL_SEC", defaults.ttl_sec),
            k: parse_or(&lookup, "TRENDS_TOP_K", defaults.k),
            n_workers: parse_or(&lookup, "TRENDS_WORKERS", defaults.n_workers),
            queue_capacity: parse_or(&lookup, "TRENDS_QUEUE_CAPACITY", defaults.queue_capacity),
            source_rate_hz: parse_or(&lookup, "TRENDS_SOURCE_RATE_HZ", defaults.source_rate_hz),
            jsonl_path: lookup("TRENDS_JSONL_PATH").filter(|s| !s.trim().is_empty()),
            sqlite_path: lookup("TRENDS_SQLITE_PATH").filter(|s| !s.trim().is_empty()),
            run_secs: lookup("TRENDS_RUN_SECS").and_then(|s| s.trim().parse().ok()),
        }
    }

    /// Window length as a `Duration` a deadline can be computed from
    pub fn window_duration(&self) -> Result<Duration, ConfigError> {
        let invalid = || {
            ConfigError::InvalidValue(format!(
                "window_sec must be between {} and a representable deadline, got {}",
                MIN_WINDOW_SEC, self.window_sec
            ))
        };

        if !(self.window_sec.is_finite() && self.window_sec >= MIN_WINDOW_SEC) {
            return Err(invalid());
        }
        let window = Duration::try_from_secs_f64(self.window_sec).map_err(|_| invalid())?;
        Instant::now().checked_add(window).ok_or_else(invalid)?;
        Ok(window)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window_duration()?;
        if !(self.ttl_sec.is_finite() && self.ttl_sec > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "ttl_sec must be a positive number, got {}",
                self.ttl_sec
            )));
        }
        if tick_period(self.source_rate_hz).is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "source_rate_hz must be positive with a non-zero period, got {}",
                self.source_rate_hz
            )));
        }
        if self.k == 0 {
            return Err(ConfigError::InvalidValue("k must be at least 1".to_string()));
        }
        if self.n_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "n_workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', defaulting to {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}
