//! Error types
//!
//! Per-session failures never reach this type: they are contained at the
//! session boundary (see [`crate::session::WriteFailure`]). What surfaces here
//! are startup problems and producer-level failures that end the pipeline.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::hub::HubError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error (bind, accept, process pipes)
    Io(io::Error),
    /// Broadcast hub rejected an operation
    Hub(HubError),
    /// Configuration could not be loaded
    Config(ConfigError),
    /// Capture source failed
    Capture(String),
    /// Encoder failed to start or died
    Encoder(String),
    /// HTTP server failed
    Server(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Hub(e) => write!(f, "Hub error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Capture(msg) => write!(f, "Capture error: {}", msg),
            Error::Encoder(msg) => write!(f, "Encoder error: {}", msg),
            Error::Server(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Hub(e) => Some(e),
            Error::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<HubError> for Error {
    fn from(e: HubError) -> Self {
        Error::Hub(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}
