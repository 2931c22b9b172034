//! nxinfo-core: Canonical image header model and header reporting.
//!
//! This crate provides the instrument-independent header, the warning
//! collector, format sniffing and the normaliser/renderer that turns a
//! populated header into a report.
//!

pub mod config;
pub mod error;
pub mod format;
pub mod header;
pub mod prefix;
pub mod report;
pub mod timestamp;
pub mod warning;

pub use config::{ExtractConfig, FileSpec, ReportOptions};
pub use error::{Error, Result};
pub use format::{classify, FormatKind, HDF5_SIGNATURE};
pub use header::{AngleRange, Axis, AxisVector, ImageHeader, NOT_AVAILABLE, UNAVAILABLE_INT};
pub use prefix::{FilePrefix, PREFIX_LEN};
pub use report::{normalize_header, render, HeaderReport};
pub use timestamp::Timestamp;
pub use warning::{Warning, WarningKind, Warnings};
