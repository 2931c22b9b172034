//! Header extraction for one container file.

use crate::field::NexusReader;
use crate::goniometer::{reconcile, ImageSelection, TriggerSummary};
use crate::links::{self, ImagePositionMap};
use crate::metadata::{
    read_geometry_vectors, read_header_fields, read_image_count, DetectorExtras, GeometryVectors,
    ImageCount,
};
use crate::{Error, Result};
use nxinfo_core::{Axis, ExtractConfig, FilePrefix, FormatKind, ImageHeader, WarningKind, Warnings};
use std::path::{Path, PathBuf};

/// Group holding the (externally linked) image data.
pub const DATA_GROUP: &str = "/entry/data";

/// Everything extracted from one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub path: PathBuf,
    pub header: ImageHeader,
    /// Counts as declared in the file.
    pub declared: ImageCount,
    /// Image count after link validation (declared total otherwise).
    pub effective_images: usize,
    /// The external links were walked and the numbering verified.
    pub validated: bool,
    /// Physical number of the header image.
    pub image_number: u64,
    /// Physical number minus storage number of the header image.
    pub image_number_offset: u64,
    pub triggers: Vec<TriggerSummary>,
    pub sweeps: usize,
    pub rotation_axis: Option<Axis>,
    /// Angles are stored in the goniometer schema.
    pub primary_schema: bool,
    /// Goniometer schema plus a detector firmware version.
    pub standard_layout: bool,
    pub geometry: GeometryVectors,
    pub extras: DetectorExtras,
    pub warnings: Warnings,
}

/// Extracts the canonical header from a file.
///
/// `requested_image` is a 1-based image number; `None` describes the first
/// image and samples whole triggers.
///
/// # Errors
/// Returns [`Error::UnrecognizedFormat`] for files that are not HDF5,
/// [`Error::MissingImageCount`] and [`Error::OutOfRangeImageRequest`] for
/// per-file failures, and the fatal errors listed on [`Error::is_fatal`].
pub fn extract<P: AsRef<Path>>(
    path: P,
    requested_image: Option<u32>,
    config: &ExtractConfig,
) -> Result<Extraction> {
    let path = path.as_ref();
    let prefix = FilePrefix::read(path)?;
    let format = prefix.format();
    if format == FormatKind::Unknown {
        return Err(Error::UnrecognizedFormat(path.display().to_string()));
    }
    tracing::info!(path = %path.display(), format = %format, "reading header");

    let file = hdf5::File::open(path)?;
    let mut reader = NexusReader::new(&file);
    let mut header = ImageHeader::empty();

    let extras = read_header_fields(&mut reader, &mut header)?;
    let declared = read_image_count(&mut reader)?;
    let declared_total = declared.total();

    let forced = requested_image.is_some_and(|n| n as usize > declared_total);
    if forced {
        tracing::info!(
            requested = requested_image,
            declared = declared_total,
            "requested image beyond declared count: checking linked data files"
        );
    }

    let (effective, positions, validated) = if config.validate_image_numbering || forced {
        check_links(&file, &mut reader, declared_total, config.validate_image_numbering)?
    } else {
        (declared_total, ImagePositionMap::identity(declared_total)?, false)
    };

    let per_trigger = if declared.triggers == 1 {
        effective
    } else {
        declared.per_trigger
    };
    let selection = match requested_image {
        None => ImageSelection::all(per_trigger, declared.triggers),
        Some(number) => {
            let position = resolve_position(number, effective, &positions)?;
            ImageSelection::single(per_trigger, declared.triggers, position)
        }
    };

    let reconciliation = reconcile(&mut reader, &selection, &mut header)?;
    let rotation_axis = reconciliation.rotation_axis(reader.warnings_mut());
    reconciliation.summarize_sweeps(per_trigger, reader.warnings_mut());

    let index = selection.header_index();
    let storage_number = index as u64 + 1;
    let image_number = positions.number_at(index).unwrap_or(storage_number);
    let image_number_offset = image_number.saturating_sub(storage_number);
    tracing::info!("Image number {image_number}/{effective}");
    if image_number_offset > 0 {
        tracing::info!(offset = image_number_offset, "image number offset");
    }

    let geometry = read_geometry_vectors(&reader)?;

    let standard_layout = reconciliation.primary_schema
        && extras
            .firmware_version
            .as_deref()
            .is_some_and(|v| !v.is_empty());
    if standard_layout {
        tracing::info!("standard layout");
    }

    Ok(Extraction {
        path: path.to_path_buf(),
        header,
        declared,
        effective_images: effective,
        validated,
        image_number,
        image_number_offset,
        triggers: reconciliation.triggers,
        sweeps: reconciliation.sweeps,
        rotation_axis,
        primary_schema: reconciliation.primary_schema,
        standard_layout,
        geometry,
        extras,
        warnings: reader.into_warnings(),
    })
}

/// Walks the external links of the data group.
///
/// When validation was not requested explicitly an unavailable link only
/// falls back to identity numbering.
fn check_links(
    file: &hdf5::File,
    reader: &mut NexusReader<'_>,
    declared: usize,
    explicit: bool,
) -> Result<(usize, ImagePositionMap, bool)> {
    if !reader.exists(DATA_GROUP) {
        reader.warnings_mut().push(
            WarningKind::MissingField,
            format!("no {DATA_GROUP} group: image numbering not verified"),
        );
        return Ok((declared, ImagePositionMap::identity(declared)?, false));
    }

    match links::validate(file, DATA_GROUP, declared, reader.warnings_mut()) {
        Ok(v) => Ok((v.effective, v.positions, true)),
        Err(Error::ExternalLinkUnavailable { link, reason }) if !explicit => {
            reader.warnings_mut().push(
                WarningKind::MissingField,
                format!("external link {link} unavailable ({reason}): image numbering not verified"),
            );
            Ok((declared, ImagePositionMap::identity(declared)?, false))
        }
        Err(e) => Err(e),
    }
}

/// Maps a 1-based image number to a zero-based storage position.
fn resolve_position(number: u32, effective: usize, positions: &ImagePositionMap) -> Result<usize> {
    let storage = number as usize;
    if storage >= 1 && storage <= effective {
        return Ok(storage - 1);
    }
    positions
        .position_of(u64::from(number))
        .ok_or(Error::OutOfRangeImageRequest {
            requested: number,
            available: effective as u64,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_position_within_count() {
        let map = ImagePositionMap::identity(10).unwrap();
        assert_eq!(resolve_position(1, 10, &map).unwrap(), 0);
        assert_eq!(resolve_position(10, 10, &map).unwrap(), 9);
    }

    #[test]
    fn test_resolve_position_out_of_range() {
        let map = ImagePositionMap::identity(10).unwrap();
        let err = resolve_position(11, 10, &map).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfRangeImageRequest {
                requested: 11,
                available: 10
            }
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unrecognized_format_is_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.cbf");
        std::fs::write(&path, b"###CBF: VERSION 1.5\n").unwrap();
        let err = extract(&path, None, &ExtractConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFormat(_)));
        assert!(!err.is_fatal());
    }
}
