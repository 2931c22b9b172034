//! Canonical, instrument-independent image header.
//!
//! Every numeric field is either a valid value or an explicit sentinel:
//! `NaN` for floating values and [`UNAVAILABLE_INT`] for integers. String
//! fields use `None` and render as [`NOT_AVAILABLE`].

use crate::timestamp::Timestamp;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel for integer fields that could not be sourced.
pub const UNAVAILABLE_INT: i32 = i32::MIN;

/// Rendered text for unavailable string fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Returns true if an integer field holds a real value.
#[inline]
#[must_use]
pub fn int_available(value: i32) -> bool {
    value != UNAVAILABLE_INT
}

/// Goniometer axis.
///
/// Omega, kappa, chi and phi rotate the sample; two-theta swings the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Axis {
    Omega,
    Kappa,
    Chi,
    Phi,
    TwoTheta,
}

impl Axis {
    /// All axes in reconciliation order.
    pub const ALL: [Axis; 5] = [
        Axis::Omega,
        Axis::Kappa,
        Axis::Chi,
        Axis::Phi,
        Axis::TwoTheta,
    ];

    /// Sample rotation axes (everything except two-theta).
    pub const SAMPLE: [Axis; 4] = [Axis::Omega, Axis::Kappa, Axis::Chi, Axis::Phi];

    /// Schema name used in dataset paths.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Axis::Omega => "omega",
            Axis::Kappa => "kappa",
            Axis::Chi => "chi",
            Axis::Phi => "phi",
            Axis::TwoTheta => "two_theta",
        }
    }

    /// Human-readable label used in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Axis::Omega => "Omega",
            Axis::Kappa => "Kappa",
            Axis::Chi => "Chi",
            Axis::Phi => "Phi",
            Axis::TwoTheta => "2-Theta",
        }
    }

    /// Position of this axis in [`Axis::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Start/end angle pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AngleRange {
    pub start: f64,
    pub end: f64,
}

impl AngleRange {
    /// Range with both ends unavailable.
    pub const UNAVAILABLE: Self = Self {
        start: f64::NAN,
        end: f64::NAN,
    };

    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// A fixed angle (start == end).
    #[must_use]
    pub fn fixed(angle: f64) -> Self {
        Self {
            start: angle,
            end: angle,
        }
    }

    /// True when both ends carry a value.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.start.is_nan() && !self.end.is_nan()
    }

    /// `end - start` (NaN if either end is unavailable).
    #[must_use]
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

impl Default for AngleRange {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}

/// Direction vector attached to a transformation or detector node.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AxisVector(pub [f64; 3]);

impl AxisVector {
    /// Vector with all components unavailable.
    pub const UNAVAILABLE: Self = Self([f64::NAN; 3]);

    /// True when every component carries a value.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.0.iter().all(|v| !v.is_nan())
    }
}

impl Default for AxisVector {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}

impl std::fmt::Display for AxisVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:8.5} {:8.5} {:8.5}", self.0[0], self.0[1], self.0[2])
    }
}

/// Canonical image header populated from one container file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ImageHeader {
    /// Detector name or serial number.
    pub detector_name: Option<String>,
    /// Acquisition start.
    pub timestamp: Option<Timestamp>,
    /// Crystal-to-detector distance [mm].
    pub distance: f64,
    /// Wavelength [Å].
    pub wavelength: f64,
    /// Pixel size along X [mm].
    pub pixel_size_x: f64,
    /// Pixel size along Y [mm].
    pub pixel_size_y: f64,
    /// Number of pixels along X.
    pub array_size_x: i32,
    /// Number of pixels along Y.
    pub array_size_y: i32,
    /// Beam centre along X [pixel].
    pub beam_centre_x: f64,
    /// Beam centre along Y [pixel].
    pub beam_centre_y: f64,
    /// Overload / count cut-off value.
    pub overload: i32,
    /// Exposure time [s].
    pub exposure_time: f64,
    /// Flux (unit not defined by the schema).
    pub flux: f64,
    /// Sensor thickness [mm].
    pub sensor_thickness: f64,
    /// Sensor material.
    pub sensor_material: Option<String>,
    /// Fraction of polarization.
    pub polarization: f64,
    pub phi: AngleRange,
    pub omega: AngleRange,
    pub chi: AngleRange,
    pub kappa: AngleRange,
    pub two_theta: AngleRange,
}

impl Default for ImageHeader {
    fn default() -> Self {
        Self::empty()
    }
}

impl ImageHeader {
    /// Header with every field set to its sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            detector_name: None,
            timestamp: None,
            distance: f64::NAN,
            wavelength: f64::NAN,
            pixel_size_x: f64::NAN,
            pixel_size_y: f64::NAN,
            array_size_x: UNAVAILABLE_INT,
            array_size_y: UNAVAILABLE_INT,
            beam_centre_x: f64::NAN,
            beam_centre_y: f64::NAN,
            overload: UNAVAILABLE_INT,
            exposure_time: f64::NAN,
            flux: f64::NAN,
            sensor_thickness: f64::NAN,
            sensor_material: None,
            polarization: f64::NAN,
            phi: AngleRange::UNAVAILABLE,
            omega: AngleRange::UNAVAILABLE,
            chi: AngleRange::UNAVAILABLE,
            kappa: AngleRange::UNAVAILABLE,
            two_theta: AngleRange::UNAVAILABLE,
        }
    }

    /// Angle range for an axis.
    #[must_use]
    pub fn angle(&self, axis: Axis) -> &AngleRange {
        match axis {
            Axis::Omega => &self.omega,
            Axis::Kappa => &self.kappa,
            Axis::Chi => &self.chi,
            Axis::Phi => &self.phi,
            Axis::TwoTheta => &self.two_theta,
        }
    }

    /// Mutable angle range for an axis.
    pub fn angle_mut(&mut self, axis: Axis) -> &mut AngleRange {
        match axis {
            Axis::Omega => &mut self.omega,
            Axis::Kappa => &mut self.kappa,
            Axis::Chi => &mut self.chi,
            Axis::Phi => &mut self.phi,
            Axis::TwoTheta => &mut self.two_theta,
        }
    }

    /// Detector name, or `"N/A"`.
    #[must_use]
    pub fn detector_name_or_na(&self) -> &str {
        self.detector_name.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    /// Sensor material, or `"N/A"`.
    #[must_use]
    pub fn sensor_material_or_na(&self) -> &str {
        self.sensor_material.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_header_uses_sentinels() {
        let h = ImageHeader::empty();
        assert!(h.distance.is_nan());
        assert!(h.wavelength.is_nan());
        assert!(!int_available(h.array_size_x));
        assert!(!int_available(h.overload));
        assert_eq!(h.detector_name_or_na(), "N/A");
        assert_eq!(h.sensor_material_or_na(), "N/A");
        for axis in Axis::ALL {
            assert!(!h.angle(axis).is_available());
        }
    }

    #[test]
    fn test_angle_mut_targets_axis() {
        let mut h = ImageHeader::empty();
        *h.angle_mut(Axis::Kappa) = AngleRange::new(1.0, 2.0);
        assert_eq!(h.kappa, AngleRange::new(1.0, 2.0));
        assert!(!h.omega.is_available());
    }

    #[test]
    fn test_axis_vector_availability() {
        assert!(!AxisVector::UNAVAILABLE.is_available());
        assert!(!AxisVector([1.0, f64::NAN, 0.0]).is_available());
        assert!(AxisVector([-1.0, 0.0, 0.0]).is_available());
    }

    #[test]
    fn test_axis_index_matches_order() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
    }
}
