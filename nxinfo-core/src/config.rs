//! Run configuration.
//!
//! Values are built once before any file is processed and passed by
//! reference into every call.

use crate::error::{Error, Result};
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for header extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractConfig {
    /// Verbosity level (0 = quiet).
    pub verbosity: u8,
    /// Walk the external data links and verify the image count/numbering.
    pub validate_image_numbering: bool,
}

impl ExtractConfig {
    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Enable or disable external-link image validation.
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_image_numbering = validate;
        self
    }
}

/// Options for rendering a header report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReportOptions {
    /// Include the detector identifier line.
    pub show_detector_id: bool,
    /// Bring start angles above 360 degrees back into [0, 360).
    pub normalize_angles: bool,
    /// Verbosity level (0 = quiet).
    pub verbosity: u8,
}

impl ReportOptions {
    /// Set detector-id output.
    #[must_use]
    pub fn with_detector_id(mut self, show: bool) -> Self {
        self.show_detector_id = show;
        self
    }

    /// Set angle normalisation.
    #[must_use]
    pub fn with_normalized_angles(mut self, normalize: bool) -> Self {
        self.normalize_angles = normalize;
        self
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// An input file plus an optional 1-based image number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSpec {
    pub path: PathBuf,
    pub image: Option<u32>,
}

impl FileSpec {
    /// Parses `path` or `path,image`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFileSpec`] for an empty path or an image
    /// number that is not a positive integer.
    pub fn parse(arg: &str) -> Result<Self> {
        let (path, image) = match arg.rsplit_once(',') {
            Some((path, image)) => {
                let image = image.trim();
                let number: u32 = image
                    .parse()
                    .map_err(|_| Error::InvalidFileSpec(format!("bad image number in {arg:?}")))?;
                if number == 0 {
                    return Err(Error::InvalidFileSpec(format!(
                        "image numbers start at 1 in {arg:?}"
                    )));
                }
                (path.trim(), Some(number))
            }
            None => (arg.trim(), None),
        };

        if path.is_empty() {
            return Err(Error::InvalidFileSpec(format!("missing path in {arg:?}")));
        }

        Ok(Self {
            path: PathBuf::from(path),
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_spec_plain_path() {
        let spec = FileSpec::parse("run_01_master.h5").unwrap();
        assert_eq!(spec.path, PathBuf::from("run_01_master.h5"));
        assert_eq!(spec.image, None);
    }

    #[test]
    fn test_file_spec_with_image() {
        let spec = FileSpec::parse("data/run_01_master.h5,12").unwrap();
        assert_eq!(spec.path, PathBuf::from("data/run_01_master.h5"));
        assert_eq!(spec.image, Some(12));
    }

    #[test]
    fn test_file_spec_rejects_bad_numbers() {
        assert!(FileSpec::parse("a.h5,0").is_err());
        assert!(FileSpec::parse("a.h5,x").is_err());
        assert!(FileSpec::parse(",3").is_err());
    }

    #[test]
    fn test_builders() {
        let cfg = ExtractConfig::default().with_verbosity(2).with_validation(true);
        assert_eq!(cfg.verbosity, 2);
        assert!(cfg.validate_image_numbering);

        let opts = ReportOptions::default()
            .with_detector_id(true)
            .with_normalized_angles(true);
        assert!(opts.show_detector_id);
        assert!(opts.normalize_angles);
        assert_eq!(opts.verbosity, 0);
    }
}
