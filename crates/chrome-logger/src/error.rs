//! Error types for the ChromeLogger adapter.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or flushing a logger.
///
/// Sanitizing context values never fails; these errors only come from
/// configuration, header emission and the persisted-file writer.
#[derive(Debug, Error)]
pub enum ChromeLogError {
    /// The persistence directory is missing, not a directory, or read-only.
    #[error("invalid persistence directory {}: {reason}", path.display())]
    InvalidPersistenceDir {
        /// The configured directory.
        path: PathBuf,
        /// Why the directory was rejected.
        reason: String,
    },

    /// The byte limit cannot hold even the truncation warning row.
    #[error("header size limit of {limit} bytes is below the minimum of {minimum} bytes")]
    LimitTooSmall {
        /// The configured limit.
        limit: usize,
        /// Size of the smallest payload the enforcer can produce.
        minimum: usize,
    },

    /// Raw header emission was attempted after the response body started.
    #[error("headers have already been sent")]
    HeadersAlreadySent,

    /// The encoded value cannot be carried in an HTTP header.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(String),

    /// Serialization of the wire payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the persisted log file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for logger operations.
pub type Result<T> = std::result::Result<T, ChromeLogError>;
