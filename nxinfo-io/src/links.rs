//! External data-link validation.
//!
//! Walks the external links of a data group, opens every linked dataset and
//! derives the number of images actually available plus the physical image
//! number stored at each position.

use crate::field::first_number;
use crate::{Error, Result};
use hdf5::filters::{deflate_available, szip_available, Filter};
use hdf5::{Dataset, File, LinkType};
use nxinfo_core::{WarningKind, Warnings};

/// HDF5 filter id registered for bitshuffle.
pub const BITSHUFFLE_FILTER_ID: i32 = 32008;

/// HDF5 filter id registered for LZ4.
pub const LZ4_FILTER_ID: i32 = 32004;

/// Physical image number for every storage position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePositionMap {
    numbers: Vec<u64>,
}

impl ImagePositionMap {
    /// Position `i` holds image `i + 1`.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the map cannot be allocated.
    pub fn identity(len: usize) -> Result<Self> {
        let mut numbers = Vec::new();
        numbers
            .try_reserve_exact(len)
            .map_err(|_| Error::Allocation(len))?;
        numbers.extend(1..=len as u64);
        Ok(Self { numbers })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Physical number of the image at a zero-based position.
    #[must_use]
    pub fn number_at(&self, position: usize) -> Option<u64> {
        self.numbers.get(position).copied()
    }

    /// Zero-based position of a physical image number.
    #[must_use]
    pub fn position_of(&self, number: u64) -> Option<usize> {
        self.numbers.iter().position(|&n| n == number)
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.numbers
            .iter()
            .enumerate()
            .all(|(i, &n)| n == i as u64 + 1)
    }
}

/// Outcome of walking the external links of a data group.
#[derive(Debug, Clone)]
pub struct LinkValidation {
    /// Images found across all linked datasets.
    pub discovered: usize,
    /// Image count to use after reconciling with the declared count.
    pub effective: usize,
    /// Physical numbering of the first `effective` positions.
    pub positions: ImagePositionMap,
}

/// True for filters on the allow-list that this HDF5 build can decode.
#[must_use]
pub fn filter_supported(filter: &Filter) -> bool {
    match filter {
        Filter::Deflate(_) => deflate_available(),
        Filter::SZip(..) => szip_available(),
        Filter::Shuffle | Filter::Fletcher32 | Filter::NBit | Filter::ScaleOffset(_) => true,
        Filter::User(id, _) => *id == BITSHUFFLE_FILTER_ID || *id == LZ4_FILTER_ID,
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Checks the compression filters of a linked dataset.
///
/// # Errors
/// Returns [`Error::UnsupportedFilter`] for any filter outside the
/// allow-list or a library filter that is not available.
pub fn check_filters(dataset: &Dataset, link: &str) -> Result<()> {
    match dataset.filters().into_iter().find(|f| !filter_supported(f)) {
        Some(filter) => Err(Error::UnsupportedFilter {
            path: link.to_string(),
            filter: format!("{filter:?}"),
        }),
        None => Ok(()),
    }
}

/// One linked slice of images.
struct Slice {
    name: String,
    count: usize,
    first_number: u64,
}

fn external_links(file: &File, group_path: &str) -> Result<Vec<String>> {
    let group = file.group(group_path)?;
    let mut names = group.iter_visit_default(Vec::new(), |_, name, info, acc| {
        if matches!(info.link_type, LinkType::External) {
            acc.push(name.to_string());
        }
        true
    })?;
    names.sort();
    Ok(names)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn inspect_slice(file: &File, group_path: &str, name: &str, next_number: u64) -> Result<Slice> {
    let path = format!("{group_path}/{name}");
    tracing::debug!(path = %path, "opening external link");
    let dataset = file
        .dataset(&path)
        .map_err(|e| Error::ExternalLinkUnavailable {
            link: path.clone(),
            reason: e.to_string(),
        })?;

    check_filters(&dataset, &path)?;

    let stored = dataset.shape().first().copied().unwrap_or(0);
    let low = dataset.attr("image_nr_low").ok().and_then(|a| first_number(&a));
    let high = dataset.attr("image_nr_high").ok().and_then(|a| first_number(&a));

    let slice = match (low, high) {
        (Some(low), Some(high)) if high >= low && low >= 1.0 => Slice {
            name: name.to_string(),
            count: (high - low) as usize + 1,
            first_number: low as u64,
        },
        _ => Slice {
            name: name.to_string(),
            count: stored,
            first_number: next_number,
        },
    };
    tracing::debug!(
        link = %slice.name,
        first = slice.first_number,
        count = slice.count,
        "linked image range"
    );
    Ok(slice)
}

/// Validates the image count of a data group against its external links.
///
/// # Errors
/// Returns [`Error::ExternalLinkUnavailable`] when a linked dataset cannot
/// be opened, [`Error::UnsupportedFilter`] for an unsupported compression
/// filter and [`Error::Allocation`] if the position map cannot be built.
pub fn validate(
    file: &File,
    group_path: &str,
    declared: usize,
    warnings: &mut Warnings,
) -> Result<LinkValidation> {
    let names = external_links(file, group_path)?;
    tracing::info!(links = names.len(), group = group_path, "checking external data links");
    if names.is_empty() {
        warnings.push(
            WarningKind::MissingField,
            format!("no external data links in {group_path}: image count not verified"),
        );
        return Ok(LinkValidation {
            discovered: declared,
            effective: declared,
            positions: ImagePositionMap::identity(declared)?,
        });
    }

    let mut slices = Vec::with_capacity(names.len());
    let mut next_number = 1;
    for name in &names {
        let slice = inspect_slice(file, group_path, name, next_number)?;
        next_number = slice.first_number + slice.count as u64;
        slices.push(slice);
    }

    let discovered: usize = slices.iter().map(|s| s.count).sum();
    let effective = match discovered.cmp(&declared) {
        std::cmp::Ordering::Less => {
            warnings.push(
                WarningKind::SchemaInconsistency,
                format!(
                    "only {discovered} of {declared} declared images found in linked data files: interrupted data collection?"
                ),
            );
            discovered
        }
        std::cmp::Ordering::Greater => {
            warnings.push(
                WarningKind::SchemaInconsistency,
                format!(
                    "{discovered} images found in linked data files but only {declared} declared: using {declared}"
                ),
            );
            declared
        }
        std::cmp::Ordering::Equal => {
            tracing::info!(images = declared, "image count confirmed by linked data files");
            declared
        }
    };

    let mut numbers = Vec::new();
    numbers
        .try_reserve_exact(effective)
        .map_err(|_| Error::Allocation(effective))?;
    'slices: for slice in &slices {
        for offset in 0..slice.count as u64 {
            if numbers.len() == effective {
                break 'slices;
            }
            numbers.push(slice.first_number + offset);
        }
    }

    Ok(LinkValidation {
        discovered,
        effective,
        positions: ImagePositionMap { numbers },
    })
}
