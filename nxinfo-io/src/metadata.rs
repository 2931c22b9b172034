//! Detector, beam and acquisition fields outside the goniometer.

use crate::field::NexusReader;
use crate::{Error, Result};
use nxinfo_core::{Axis, AxisVector, ImageHeader, Timestamp, WarningKind};

const DETECTOR: &str = "/entry/instrument/detector";
const DETECTOR_SPECIFIC: &str = "/entry/instrument/detector/detectorSpecific";
const BEAM: &str = "/entry/instrument/beam";
const TRANSFORMATIONS: &str = "/entry/sample/transformations";

/// Thickness (mm) above which the stored value is taken to be in micrometres.
const THICKNESS_UNIT_SLIP_MM: f64 = 320.0;

const KNOWN_SENSOR_MATERIALS: [&str; 3] = ["Si", "Silicon", "CdTe"];

fn detector(name: &str) -> String {
    format!("{DETECTOR}/{name}")
}

fn detector_specific(name: &str) -> String {
    format!("{DETECTOR_SPECIFIC}/{name}")
}

/// Informational fields that are not part of the canonical header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorExtras {
    pub description: Option<String>,
    pub firmware_version: Option<String>,
    /// Threshold energy [eV].
    pub threshold_energy: Option<f64>,
    /// Detector readout time [s].
    pub readout_time: Option<f64>,
    pub nframes_sum: Option<i64>,
    pub nsequences: Option<i64>,
}

/// Declared image counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCount {
    pub per_trigger: usize,
    pub triggers: usize,
}

impl ImageCount {
    #[must_use]
    pub fn total(&self) -> usize {
        self.per_trigger.saturating_mul(self.triggers)
    }
}

/// Direction vectors of the goniometer and detector transformations.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryVectors {
    /// Axis vectors indexed by [`Axis::index`].
    pub axes: [AxisVector; 5],
    pub detector_distance: AxisVector,
    pub fast_pixel_direction: AxisVector,
    pub slow_pixel_direction: AxisVector,
}

impl GeometryVectors {
    #[must_use]
    pub fn axis(&self, axis: Axis) -> AxisVector {
        self.axes[axis.index()]
    }
}

/// Reads every header field that does not come from the goniometer.
///
/// # Errors
/// Propagates fatal reader errors.
pub fn read_header_fields(
    reader: &mut NexusReader<'_>,
    header: &mut ImageHeader,
) -> Result<DetectorExtras> {
    header.detector_name = match reader.read_string(&detector("detector_number"))? {
        Some(name) => Some(name),
        None => reader.read_string(&detector("serial_number"))?,
    };

    read_timestamp(reader, header)?;

    if let Some(wavelength) =
        reader.read_scalar::<f64>(&format!("{BEAM}/incident_wavelength"), Some("angstrom"))?
    {
        header.wavelength = wavelength;
    }
    if let Some(flux) = reader.read_scalar::<f64>(&format!("{BEAM}/total_flux"), None)? {
        header.flux = flux;
    }

    read_beam_centre(reader, header)?;

    let distance_paths = [
        detector("detector_distance"),
        "/entry/instrument/detector_distance".to_string(),
        detector("distance"),
    ];
    let distance_paths: Vec<&str> = distance_paths.iter().map(String::as_str).collect();
    if let Some(metres) = reader.read_first_of::<f64>(&distance_paths, Some("m"))? {
        header.distance = metres * 1000.0;
    }

    let exposure_paths = [detector("frame_time"), detector("count_time")];
    let exposure_paths: Vec<&str> = exposure_paths.iter().map(String::as_str).collect();
    if let Some(seconds) = reader.read_first_of::<f64>(&exposure_paths, Some("s"))? {
        header.exposure_time = seconds;
    }

    read_array_size(reader, header)?;

    if let Some(x) = reader.read_scalar::<f64>(&detector("x_pixel_size"), Some("m"))? {
        header.pixel_size_x = x * 1000.0;
    }
    if let Some(y) = reader.read_scalar::<f64>(&detector("y_pixel_size"), Some("m"))? {
        header.pixel_size_y = y * 1000.0;
    }

    read_sensor(reader, header)?;

    let overload_paths = [
        detector_specific("countrate_correction_count_cutoff"),
        detector("saturation_value"),
    ];
    let overload_paths: Vec<&str> = overload_paths.iter().map(String::as_str).collect();
    if let Some(overload) = reader.read_first_of::<i32>(&overload_paths, None)? {
        header.overload = overload;
    }

    Ok(DetectorExtras {
        description: reader.read_string(&detector("description"))?,
        firmware_version: reader.read_string(&detector_specific("eiger_fw_version"))?,
        threshold_energy: reader.read_scalar(&detector("threshold_energy"), Some("eV"))?,
        readout_time: reader.read_scalar(&detector("detector_readout_time"), Some("s"))?,
        nframes_sum: reader.read_scalar(&detector_specific("nframes_sum"), None)?,
        nsequences: reader.read_scalar(&detector_specific("nsequences"), None)?,
    })
}

fn read_timestamp(reader: &mut NexusReader<'_>, header: &mut ImageHeader) -> Result<()> {
    let text = match reader.read_string(&detector_specific("data_collection_date"))? {
        Some(text) => Some(text),
        None => reader.read_string("/entry/start_time")?,
    };
    let Some(text) = text else {
        return Ok(());
    };
    match Timestamp::parse(&text) {
        Ok(ts) => header.timestamp = Some(ts),
        Err(_) => reader.warnings_mut().push(
            WarningKind::SuspiciousValue,
            format!("unable to parse acquisition date \"{text}\""),
        ),
    }
    Ok(())
}

fn read_beam_centre(reader: &mut NexusReader<'_>, header: &mut ImageHeader) -> Result<()> {
    for spelling in ["center", "centre"] {
        let x = reader.read_scalar::<f64>(&detector(&format!("beam_{spelling}_x")), Some("pixel"))?;
        let y = reader.read_scalar::<f64>(&detector(&format!("beam_{spelling}_y")), Some("pixel"))?;
        if let (Some(x), Some(y)) = (x, y) {
            header.beam_centre_x = x;
            header.beam_centre_y = y;
            return Ok(());
        }
    }
    Ok(())
}

fn read_array_size(reader: &mut NexusReader<'_>, header: &mut ImageHeader) -> Result<()> {
    for suffix in ["pixels_in_detector", "pixels"] {
        let x = reader.read_scalar::<i32>(&detector_specific(&format!("x_{suffix}")), None)?;
        let y = reader.read_scalar::<i32>(&detector_specific(&format!("y_{suffix}")), None)?;
        if let (Some(x), Some(y)) = (x, y) {
            header.array_size_x = x;
            header.array_size_y = y;
            return Ok(());
        }
    }

    let data_size = detector("module/data_size");
    if reader.dataset_len(&data_size).unwrap_or(0) >= 2 {
        if let Some(size) = reader.read_array::<i32>(&data_size, None, 2)? {
            header.array_size_y = size[0];
            header.array_size_x = size[1];
        }
    }
    Ok(())
}

fn read_sensor(reader: &mut NexusReader<'_>, header: &mut ImageHeader) -> Result<()> {
    if let Some(metres) = reader.read_scalar::<f64>(&detector("sensor_thickness"), Some("m"))? {
        let mut thickness = metres * 1000.0;
        if thickness >= THICKNESS_UNIT_SLIP_MM {
            reader.warnings_mut().push(
                WarningKind::SuspiciousValue,
                format!("sensor thickness of {thickness} mm is implausible: assuming micrometres"),
            );
            thickness /= 1000.0;
        }
        header.sensor_thickness = thickness;
    }

    if let Some(material) = reader.read_string(&detector("sensor_material"))? {
        if !KNOWN_SENSOR_MATERIALS.contains(&material.as_str()) {
            reader.warnings_mut().push(
                WarningKind::SuspiciousValue,
                format!("unexpected sensor material \"{material}\""),
            );
        }
        header.sensor_material = Some(material);
    }
    Ok(())
}

/// Reads the declared image and trigger counts.
///
/// # Errors
/// Returns [`Error::MissingImageCount`] when no image count can be found.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn read_image_count(reader: &mut NexusReader<'_>) -> Result<ImageCount> {
    let declared = reader
        .read_scalar::<i64>(&detector_specific("nimages"), None)?
        .filter(|&n| n > 0);

    let per_trigger = match declared {
        Some(n) => n as usize,
        None => {
            let axes = reader.read_attr_string("/entry/data", "axes");
            let omega_axis = axes
                .as_deref()
                .filter(|a| a.eq_ignore_ascii_case("omega") || a.eq_ignore_ascii_case("gonomega"));
            match omega_axis.and_then(|a| reader.dataset_len(&format!("/entry/data/{a}"))) {
                Some(n) if n > 0 => {
                    tracing::info!(images = n, "image count taken from the data axis");
                    n
                }
                _ => return Err(Error::MissingImageCount),
            }
        }
    };

    let triggers = match reader.read_scalar::<i64>(&detector_specific("ntrigger"), None)? {
        None => 1,
        Some(n) if n <= 0 => {
            reader.warnings_mut().push(
                WarningKind::SuspiciousValue,
                format!("ntrigger = {n} is not positive: assuming 1"),
            );
            1
        }
        Some(n) => n as usize,
    };
    if triggers > 1 {
        tracing::info!(triggers, per_trigger, "multi-trigger data collection");
    }

    Ok(ImageCount {
        per_trigger,
        triggers,
    })
}

/// Reads the transformation and detector direction vectors.
///
/// # Errors
/// Propagates fatal reader errors.
pub fn read_geometry_vectors(reader: &NexusReader<'_>) -> Result<GeometryVectors> {
    let mut axes = [AxisVector::UNAVAILABLE; 5];
    for axis in Axis::ALL {
        let mut vector = reader.read_axis_vector(&format!("{TRANSFORMATIONS}/{}", axis.name()))?;
        if axis == Axis::Omega && !vector.is_available() {
            vector = reader.read_axis_vector(&format!("{TRANSFORMATIONS}/gonomega"))?;
        }
        axes[axis.index()] = vector;
    }

    Ok(GeometryVectors {
        axes,
        detector_distance: reader.read_axis_vector(&detector("detector_distance"))?,
        fast_pixel_direction: reader.read_axis_vector(&detector("module/fast_pixel_direction"))?,
        slow_pixel_direction: reader.read_axis_vector(&detector("module/slow_pixel_direction"))?,
    })
}
