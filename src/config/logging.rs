//! Logging configuration.

use std::str::FromStr;

use super::parse::{env_opt, env_or};
use super::ConfigError;

/// Output format of the crate's own diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human readable `tracing-subscriber` output.
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format '{}', expected: json, text", other)),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name for structured logging.
    pub service_name: String,
    /// Diagnostics output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "reqtrail=info".to_string(),
            service_name: "reqtrail".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: reqtrail=debug,hyper=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = env_or("LOG_FORMAT", "json")
            .parse()
            .map_err(|message| ConfigError::Invalid {
                key: "LOG_FORMAT".into(),
                message,
            })?;

        Ok(Self {
            filter: resolve_log_filter(env_opt("LOG_LEVEL"), env_opt("RUST_LOG")),
            service_name: env_or("SERVICE_NAME", "reqtrail"),
            format,
        })
    }
}

/// Priority: LOG_LEVEL > RUST_LOG > default (info)
fn resolve_log_filter(log_level: Option<String>, rust_log: Option<String>) -> String {
    if let Some(level) = log_level {
        let level = level.to_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {
                return format!("reqtrail={}", level);
            }
            _ => {
                // Subscriber is not installed yet
                eprintln!(
                    "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                    level
                );
            }
        }
    }

    if let Some(filter) = rust_log {
        return filter;
    }

    "reqtrail=info".to_string()
}
