//! nxinfo-io: HDF5/NeXus header extraction for nxinfo.
//!
//! This crate reads typed fields from HDF5 master files across the schema
//! variants written by area detectors, reconciles goniometer angles over
//! multiple triggers and validates image counts against linked data files.
//!

mod error;
pub mod extract;
pub mod field;
pub mod goniometer;
pub mod links;
pub mod metadata;

pub use error::{Error, Result};
pub use extract::{extract, Extraction, DATA_GROUP};
pub use field::{fit_array, FieldType, NexusReader};
pub use goniometer::{AngleSource, Continuity, ImageSelection, Reconciliation, TriggerSummary};
pub use links::{ImagePositionMap, LinkValidation};
pub use metadata::{DetectorExtras, GeometryVectors, ImageCount};
