//! Error types for the capture system.
//!
//! All errors in the system are represented by the [`Error`] enum.
//! This ensures composable error handling across crates.

use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// The core error type for all capture operations.
#[derive(ThisError, Debug)]
pub enum Error {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Invalid file path (outside vault, illegal characters, etc.)
    #[error("Invalid file path: {reason}")]
    InvalidPath { reason: String },

    /// Path traversal attempt detected
    #[error("Path traversal detected: {path}")]
    PathTraversalAttempt { path: PathBuf },

    /// Parse error
    #[error("Parse error: {reason}")]
    ParseError { reason: String },

    /// Invalid configuration
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// A prompted value could not be interpreted as a date
    #[error("Could not parse \"{input}\" as a date")]
    DateParseError { input: String },

    /// Insert-after or inline anchor not located in the destination.
    /// Recoverable: callers skip the write and continue.
    #[error("Anchor not found: {anchor}")]
    AnchorNotFound { anchor: String },

    /// Named thing missing (template file, canvas node, active file, ...)
    #[error("Not found: {key}")]
    NotFound { key: String },

    /// Concurrent modification detected between read and write
    #[error("Concurrent modification: {reason}")]
    ConcurrencyError { reason: String },

    /// User cancelled a prompt or suggestion.
    /// Distinguished from failures so callers can suppress error reporting.
    #[error("Aborted by user")]
    Aborted,

    /// Generic unclassified error
    #[error("Error: {0}")]
    Other(String),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error
    pub fn io(err: io::Error) -> Self {
        Error::Io(err)
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Error::FileNotFound { path: path.into() }
    }

    /// Create an invalid path error
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            reason: reason.into(),
        }
    }

    /// Create a path traversal error
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        Error::PathTraversalAttempt { path: path.into() }
    }

    /// Create a parse error
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Error::ParseError {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(reason: impl Into<String>) -> Self {
        Error::ConfigError {
            reason: reason.into(),
        }
    }

    /// Create a date parse error
    pub fn date_parse(input: impl Into<String>) -> Self {
        Error::DateParseError {
            input: input.into(),
        }
    }

    /// Create an anchor not found error
    pub fn anchor_not_found(anchor: impl Into<String>) -> Self {
        Error::AnchorNotFound {
            anchor: anchor.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// Create a concurrency error
    pub fn concurrency_error(reason: impl Into<String>) -> Self {
        Error::ConcurrencyError {
            reason: reason.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Whether this error is a user-initiated cancellation
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Whether callers may degrade gracefully instead of stopping the run
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::AnchorNotFound { .. } | Error::NotFound { .. })
    }
}
