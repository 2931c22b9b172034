//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// The leading bytes do not match a supported container.
    #[error("unrecognized file format: {0}")]
    UnrecognizedFormat(String),

    /// A dataset uses a storage type that cannot be coerced.
    #[error("unsupported storage type for {path}: {detail}")]
    UnsupportedStorageType { path: String, detail: String },

    /// A linked data file uses a compression filter outside the allow-list.
    #[error("unsupported filter {filter} on {path}")]
    UnsupportedFilter { path: String, filter: String },

    /// A buffer could not be allocated.
    #[error("unable to allocate {0} elements")]
    Allocation(usize),

    /// An external data file could not be opened.
    #[error("external link {link} is unavailable: {reason}")]
    ExternalLinkUnavailable { link: String, reason: String },

    /// The requested image lies outside every trigger.
    #[error("requested image {requested} is out of range (1-{available})")]
    OutOfRangeImageRequest { requested: u32, available: u64 },

    /// No image count could be sourced.
    #[error("unable to determine the number of images")]
    MissingImageCount,

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] nxinfo_core::Error),
}

impl Error {
    /// True for errors that must stop processing of all remaining files.
    ///
    /// Everything else only fails the current file.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Hdf5(_)
                | Error::UnsupportedStorageType { .. }
                | Error::UnsupportedFilter { .. }
                | Error::Allocation(_)
                | Error::ExternalLinkUnavailable { .. }
        )
    }
}
