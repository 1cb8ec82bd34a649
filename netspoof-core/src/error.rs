//! Error types for netspoof

use thiserror::Error;

/// Result type alias for netspoof operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for netspoof
#[derive(Error, Debug)]
pub enum Error {
    /// Network or process I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Configuration is incomplete or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Capture error
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// Address could not be resolved
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Engine is already running
    #[error("{0} is already started")]
    AlreadyStarted(String),

    /// Engine is not running
    #[error("{0} is not running")]
    NotRunning(String),

    /// External command failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl Error {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Error::NotFound(what.into())
    }

    /// Create an already-started error for the named engine
    pub fn already_started<S: Into<String>>(engine: S) -> Self {
        Error::AlreadyStarted(engine.into())
    }

    /// Create a packet construction error
    pub fn construction<S: Into<String>>(msg: S) -> Self {
        Error::PacketConstruction(msg.into())
    }

    /// Create a packet parsing error
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Error::PacketParsing(msg.into())
    }

    /// Whether this error should fail `start` (as opposed to being absorbed in a loop)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::InvalidParameter { .. }
        )
    }
}
