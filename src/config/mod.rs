//! Configuration loaded from environment variables.
//!
//! ```rust,ignore
//! use reqtrail::config::Config;
//!
//! let config = Config::from_env()?;
//! let logger = reqtrail::Logger::from_config(&config.sink)?;
//! ```

mod error;
mod logging;
mod parse;
mod server;
mod sink;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;
pub use sink::{LogstashConfig, SinkConfig};

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Demo server configuration.
    pub server: ServerConfig,
    /// Record sink configuration.
    pub sink: SinkConfig,
    /// Diagnostics configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            sink: SinkConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Service: {}", self.logging.service_name);
        info!("  Console records: {}", if self.sink.console { "enabled" } else { "disabled" });

        match self.sink.logstash {
            Some(ref logstash) => info!(
                "  Logstash: {} (queue {})",
                logstash.address(),
                logstash.queue_capacity
            ),
            None => info!("  Logstash: disabled"),
        }
    }
}
