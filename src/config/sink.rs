//! Record sink configuration.

use serde_json::{Map, Value};

use super::parse::{env_bool, env_json_object, env_or, env_parse};
use super::ConfigError;

/// Where request records are written.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Write records to stdout.
    pub console: bool,
    /// Ship records to logstash, if enabled.
    pub logstash: Option<LogstashConfig>,
}

/// Logstash TCP input settings.
#[derive(Clone, Debug, PartialEq)]
pub struct LogstashConfig {
    pub host: String,
    pub port: u16,
    /// Static fields merged into every record.
    pub fields: Map<String, Value>,
    /// Lines buffered while the connection is slow or down.
    pub queue_capacity: usize,
}

impl Default for LogstashConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5000,
            fields: Map::new(),
            queue_capacity: 1024,
        }
    }
}

impl LogstashConfig {
    /// `host:port` to connect to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "LOGSTASH_HOST".into(),
                message: "must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                key: "LOGSTASH_PORT".into(),
                message: "must not be 0".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "LOGSTASH_QUEUE".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(self)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            console: true,
            logstash: None,
        }
    }
}

impl SinkConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let logstash = if env_bool("LOGSTASH_ENABLED", false) {
            let config = LogstashConfig {
                host: env_or("LOGSTASH_HOST", "localhost"),
                port: env_parse("LOGSTASH_PORT", 5000)?,
                fields: env_json_object("LOGSTASH_FIELDS")?,
                queue_capacity: env_parse("LOGSTASH_QUEUE", 1024)?,
            };
            Some(config.validate()?)
        } else {
            None
        };

        Ok(Self {
            console: env_bool("LOG_CONSOLE", true),
            logstash,
        })
    }

    /// Whether any sink is enabled.
    pub fn is_enabled(&self) -> bool {
        self.console || self.logstash.is_some()
    }
}
