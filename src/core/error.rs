//! Core error types.

use std::fmt;

use crate::config::ConfigError;

/// Errors raised while setting up logging.
///
/// Nothing on the request path returns these: instrumentation never fails a
/// request.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration.
    Config(ConfigError),

    /// I/O error.
    Io(std::io::Error),

    /// A sink needing a background task was built outside a Tokio runtime.
    NoRuntime,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NoRuntime => write!(f, "no Tokio runtime available to run the sink"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::NoRuntime => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
