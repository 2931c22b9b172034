//! Typed field access into an HDF5/NeXus container.
//!
//! Absence of a path is a normal outcome and yields `None`. A dataset that
//! exists but cannot be read is recorded as a warning and also yields
//! `None`. Storage types that cannot be coerced to a number stop the run.

use crate::{Error, Result};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, Container, File, LocationType};
use nxinfo_core::{AxisVector, WarningKind, Warnings};

/// Longest fixed-length string read from a container.
const MAX_FIXED_STRING: usize = 1024;

/// Numeric types a field can be coerced into.
pub trait FieldType: Copy {
    fn from_f64(value: f64) -> Self;
}

impl FieldType for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
}

#[allow(clippy::cast_possible_truncation)]
impl FieldType for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

#[allow(clippy::cast_possible_truncation)]
impl FieldType for i32 {
    fn from_f64(value: f64) -> Self {
        value as i32
    }
}

#[allow(clippy::cast_possible_truncation)]
impl FieldType for i64 {
    fn from_f64(value: f64) -> Self {
        value as i64
    }
}

/// Result of comparing a stored unit against the requested one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitMatch {
    /// Same unit (or a spelling variant).
    Same,
    /// Known pair; multiply the stored value by the factor.
    Scale(f64),
    /// Unknown pair; the value is returned unscaled.
    Mismatch,
}

/// Compares a stored unit with the requested one.
#[must_use]
pub fn match_unit(requested: &str, stored: &str) -> UnitMatch {
    let requested = requested.trim();
    let stored = stored.trim();
    if requested.eq_ignore_ascii_case(stored) {
        return UnitMatch::Same;
    }

    match (
        requested.to_ascii_lowercase().as_str(),
        stored.to_ascii_lowercase().as_str(),
    ) {
        ("mm", "m") => UnitMatch::Scale(1000.0),
        ("m", "mm") => UnitMatch::Scale(0.001),
        ("degree" | "degrees", "deg") | ("deg", "degree" | "degrees") => UnitMatch::Same,
        (a, b) if differs_by_last_char(a, b) => UnitMatch::Same,
        _ => UnitMatch::Mismatch,
    }
}

fn differs_by_last_char(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    !short.is_empty() && long.len() == short.len() + 1 && long.starts_with(short)
}

/// Fits a stored array to the requested length.
///
/// Longer input is truncated. Shorter, non-empty input is padded with its
/// last value, which broadcasts a single stored value.
///
/// # Errors
/// Returns [`Error::Allocation`] if the padded buffer cannot be allocated.
pub fn fit_array<T: Copy>(mut values: Vec<T>, len: usize) -> Result<Vec<T>> {
    if values.len() >= len {
        values.truncate(len);
        return Ok(values);
    }
    let Some(&last) = values.last() else {
        return Ok(values);
    };
    values
        .try_reserve_exact(len - values.len())
        .map_err(|_| Error::Allocation(len))?;
    values.resize(len, last);
    Ok(values)
}

/// Cuts a string at the first NUL and trims surrounding whitespace.
#[must_use]
pub fn clean_string(raw: &str) -> String {
    let end = raw.find('\0').unwrap_or(raw.len());
    raw[..end].trim().to_string()
}

enum Numbers {
    Values(Vec<f64>),
    Unsupported(String),
}

#[allow(clippy::cast_precision_loss)]
fn read_numbers(container: &Container) -> hdf5::Result<Numbers> {
    let values = match container.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) => container
            .read_raw::<i64>()?
            .into_iter()
            .map(|v| v as f64)
            .collect(),
        TypeDescriptor::Unsigned(_) => container
            .read_raw::<u64>()?
            .into_iter()
            .map(|v| v as f64)
            .collect(),
        TypeDescriptor::Float(_) => container.read_raw::<f64>()?,
        other => return Ok(Numbers::Unsupported(format!("{other:?}"))),
    };
    Ok(Numbers::Values(values))
}

/// First numeric value of a dataset or attribute, if it has one.
pub(crate) fn first_number(container: &Container) -> Option<f64> {
    match read_numbers(container) {
        Ok(Numbers::Values(values)) => values.first().copied(),
        _ => None,
    }
}

fn read_strings(container: &Container) -> hdf5::Result<Option<String>> {
    let first = match container.dtype()?.to_descriptor()? {
        TypeDescriptor::VarLenUnicode => container
            .read_raw::<VarLenUnicode>()?
            .first()
            .map(|s| s.as_str().to_string()),
        TypeDescriptor::VarLenAscii => container
            .read_raw::<VarLenAscii>()?
            .first()
            .map(|s| s.as_str().to_string()),
        TypeDescriptor::FixedAscii(_) => container
            .read_raw::<FixedAscii<MAX_FIXED_STRING>>()?
            .first()
            .map(|s| s.as_str().to_string()),
        TypeDescriptor::FixedUnicode(_) => container
            .read_raw::<FixedUnicode<MAX_FIXED_STRING>>()?
            .first()
            .map(|s| s.as_str().to_string()),
        _ => None,
    };
    Ok(first.map(|s| clean_string(&s)))
}

/// Typed reader over one open container.
///
/// Collects the warnings raised while reading so the caller can attach them
/// to the extraction result.
pub struct NexusReader<'f> {
    file: &'f File,
    warnings: Warnings,
}

impl<'f> NexusReader<'f> {
    pub fn new(file: &'f File) -> Self {
        Self {
            file,
            warnings: Warnings::new(),
        }
    }

    #[must_use]
    pub fn file(&self) -> &'f File {
        self.file
    }

    pub fn warnings_mut(&mut self) -> &mut Warnings {
        &mut self.warnings
    }

    #[must_use]
    pub fn into_warnings(self) -> Warnings {
        self.warnings
    }

    /// True if every component of an absolute path exists as a link.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            if !self.file.link_exists(&current) {
                return false;
            }
        }
        !current.is_empty()
    }

    /// Reads the first value of a numeric dataset.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedStorageType`] for non-numeric storage.
    pub fn read_scalar<T: FieldType>(&mut self, path: &str, unit: Option<&str>) -> Result<Option<T>> {
        Ok(self
            .read_values(path, unit)?
            .and_then(|values| values.first().copied())
            .map(T::from_f64))
    }

    /// Reads a numeric dataset fitted to `len` values.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedStorageType`] for non-numeric storage or
    /// [`Error::Allocation`] if the buffer cannot be allocated.
    pub fn read_array<T: FieldType>(
        &mut self,
        path: &str,
        unit: Option<&str>,
        len: usize,
    ) -> Result<Option<Vec<T>>> {
        let Some(values) = self.read_values(path, unit)? else {
            return Ok(None);
        };
        if values.is_empty() {
            return Ok(None);
        }
        let fitted = fit_array(values, len)?;
        Ok(Some(fitted.into_iter().map(T::from_f64).collect()))
    }

    /// Reads the first path in `paths` that yields a value.
    ///
    /// # Errors
    /// Propagates the errors of [`NexusReader::read_scalar`].
    pub fn read_first_of<T: FieldType>(
        &mut self,
        paths: &[&str],
        unit: Option<&str>,
    ) -> Result<Option<T>> {
        for path in paths {
            if let Some(value) = self.read_scalar(path, unit)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Number of elements stored at a dataset path.
    #[must_use]
    pub fn dataset_len(&self, path: &str) -> Option<usize> {
        if !self.exists(path) {
            return None;
        }
        self.file.dataset(path).ok().map(|ds| ds.size())
    }

    /// Reads a string dataset (fixed or variable length).
    ///
    /// # Errors
    /// Currently infallible; unreadable strings become warnings.
    pub fn read_string(&mut self, path: &str) -> Result<Option<String>> {
        if !self.exists(path) {
            return Ok(None);
        }
        tracing::debug!(path, "will read string");
        let value = self.file.dataset(path).and_then(|ds| read_strings(&ds));
        match value {
            Ok(value) => Ok(value.filter(|s| !s.is_empty())),
            Err(e) => {
                self.warnings.push(
                    WarningKind::MissingField,
                    format!("unable to read string {path}: {e}"),
                );
                Ok(None)
            }
        }
    }

    /// Reads the first element of a string attribute on a group or dataset.
    #[must_use]
    pub fn read_attr_string(&self, path: &str, name: &str) -> Option<String> {
        let attr = self.attribute(path, name)?;
        read_strings(&attr).ok().flatten().filter(|s| !s.is_empty())
    }

    /// Reads the first element of a numeric attribute on a group or dataset.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedStorageType`] for non-numeric storage.
    pub fn read_attr_scalar<T: FieldType>(&self, path: &str, name: &str) -> Result<Option<T>> {
        let Some(attr) = self.attribute(path, name) else {
            return Ok(None);
        };
        match read_numbers(&attr) {
            Ok(Numbers::Values(values)) => Ok(values.first().copied().map(T::from_f64)),
            Ok(Numbers::Unsupported(detail)) => Err(Error::UnsupportedStorageType {
                path: format!("{path}@{name}"),
                detail,
            }),
            Err(_) => Ok(None),
        }
    }

    /// Reads the 3-component `vector` attribute of a transformation node.
    ///
    /// Missing nodes and attributes yield [`AxisVector::UNAVAILABLE`].
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedStorageType`] for non-numeric storage.
    pub fn read_axis_vector(&self, path: &str) -> Result<AxisVector> {
        let Some(attr) = self.attribute(path, "vector") else {
            return Ok(AxisVector::UNAVAILABLE);
        };
        match read_numbers(&attr) {
            Ok(Numbers::Values(values)) if values.len() >= 3 => {
                Ok(AxisVector([values[0], values[1], values[2]]))
            }
            Ok(Numbers::Unsupported(detail)) => Err(Error::UnsupportedStorageType {
                path: format!("{path}@vector"),
                detail,
            }),
            _ => Ok(AxisVector::UNAVAILABLE),
        }
    }

    fn attribute(&self, path: &str, name: &str) -> Option<Attribute> {
        if !self.exists(path) {
            return None;
        }
        match self.file.loc_type_by_name(path).ok()? {
            LocationType::Group => self.file.group(path).ok()?.attr(name).ok(),
            LocationType::Dataset => self.file.dataset(path).ok()?.attr(name).ok(),
            LocationType::NamedDatatype => None,
        }
    }

    fn read_values(&mut self, path: &str, unit: Option<&str>) -> Result<Option<Vec<f64>>> {
        if !self.exists(path) {
            tracing::debug!(path, "not present");
            return Ok(None);
        }
        tracing::debug!(path, "will read");

        let dataset = match self.file.dataset(path) {
            Ok(ds) => ds,
            Err(e) => {
                self.warnings.push(
                    WarningKind::MissingField,
                    format!("unable to open {path}: {e}"),
                );
                return Ok(None);
            }
        };

        let mut values = match read_numbers(&dataset) {
            Ok(Numbers::Values(values)) => values,
            Ok(Numbers::Unsupported(detail)) => {
                return Err(Error::UnsupportedStorageType {
                    path: path.to_string(),
                    detail,
                })
            }
            Err(e) => {
                self.warnings.push(
                    WarningKind::MissingField,
                    format!("unable to read {path}: {e}"),
                );
                return Ok(None);
            }
        };

        if let Some(requested) = unit {
            if let Some(stored) = self.read_attr_string(path, "units") {
                match match_unit(requested, &stored) {
                    UnitMatch::Same => {}
                    UnitMatch::Scale(factor) => {
                        tracing::debug!(path, %stored, requested, factor, "converting units");
                        values.iter_mut().for_each(|v| *v *= factor);
                    }
                    UnitMatch::Mismatch => self.warnings.push(
                        WarningKind::UnitMismatch,
                        format!("{path} is stored in \"{stored}\" instead of \"{requested}\""),
                    ),
                }
            }
        }

        Ok(Some(values))
    }
}
