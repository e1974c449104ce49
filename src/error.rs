//! Error types for Chalak

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Chalak error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (sockets, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Status payload serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hardware driver reported a failure
    #[error("Device error: {0}")]
    Device(String),

    /// Malformed request on the command channel
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Startup self-check did not pass; the robot must not move
    #[error("Self-check failed: {0}")]
    SelfCheckFailed(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

