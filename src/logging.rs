// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tracing subscriber setup for binaries and tests embedding the pool.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! the host application's call. Log lines go to stderr so command output on
//! stdout stays machine-readable.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full tracing filter, takes precedence
//! - `GPU_MEMPOOL_LOG_LEVEL`: simple level (error, warn, info, debug, trace)
//! - `GPU_MEMPOOL_LOG_FORMAT`: `human` or `json`

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: OnceLock<()> = OnceLock::new();

const DEFAULT_LEVEL: &str = "info";
const LOG_LEVEL_ENV: &str = "GPU_MEMPOOL_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "GPU_MEMPOOL_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("invalid log format: {0}")]
    InvalidFormat(String),

    #[error("failed to install subscriber: {0}")]
    Install(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::InvalidFormat(other.to_string())),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `debug` or
    /// `gpu_mempool=trace`.
    pub level: String,
    pub format: LogFormat,
    pub with_file_info: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: LogFormat::Human,
            with_file_info: false,
        }
    }
}

impl LogConfig {
    /// Read level and format from the environment, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self, LoggingError> {
        let mut config = Self::default();
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.level = level;
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        let filter = match std::env::var("RUST_LOG") {
            Ok(directives) => EnvFilter::try_new(directives),
            Err(_) => EnvFilter::try_new(&self.level),
        };
        filter.map_err(|e| LoggingError::InvalidFilter(e.to_string()))
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Human => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(config.with_file_info)
                    .with_line_number(config.with_file_info),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_file(config.with_file_info)
                    .with_line_number(config.with_file_info),
            )
            .try_init(),
    };
    result.map_err(|e| LoggingError::Install(e.to_string()))?;
    let _ = INITIALIZED.set(());
    Ok(())
}

/// Install the subscriber from environment variables.
pub fn init_from_env() -> Result<(), LoggingError> {
    init_logging(&LogConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Human ".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LogConfig::default().with_level("gpu_mempool=loud");
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(config.filter(), Err(LoggingError::InvalidFilter(_))));
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig::default().with_level("warn");
        init_logging(&config).unwrap();
        init_logging(&config).unwrap();
    }
}
