//! Error types for nxinfo-core.

use thiserror::Error;

/// Result type alias for nxinfo core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timestamp text that does not follow `YYYY-MM-DDTHH:MM:SS[.f]`.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Malformed `path,image` file argument.
    #[error("invalid file specification: {0}")]
    InvalidFileSpec(String),
}
