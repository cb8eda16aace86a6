//! # Error Types
//!
//! Custom error types for the ground station using `thiserror`.
//!
//! Field-level problems (a missing column, a non-numeric altitude) are not
//! errors here: the typed accessors report them as `None`.

use thiserror::Error;

/// Main error type for the ground station
#[derive(Debug, Error)]
pub enum GroundStationError {
    /// The serial port could not be opened, so no session was started
    #[error("Session start failed on {port}: {reason}")]
    SessionStart {
        /// Port path that was tried
        port: String,
        /// Underlying failure
        reason: String,
    },

    /// A session is already reading from the port
    #[error("Session already running")]
    SessionAlreadyRunning,

    /// Serial transport errors (read failures on an open port)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Frame bytes were not valid UTF-8
    #[error("Decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Telemetry log write failures
    #[error("Persistence error: {0}")]
    Persistence(#[source] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the ground station
pub type Result<T> = std::result::Result<T, GroundStationError>;
