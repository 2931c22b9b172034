//! Header normalisation, sanity checks and the human-readable report.

use crate::config::ReportOptions;
use crate::header::{int_available, AngleRange, Axis, ImageHeader};
use crate::warning::{WarningKind, Warnings};
use std::fmt::Write;

/// Values in `(-NEGATIVE_ZERO_TOLERANCE, 0]` are reported as `0.0`.
pub const NEGATIVE_ZERO_TOLERANCE: f64 = 1.0e-4;

/// Full turn in degrees.
pub const FULL_TURN: f64 = 360.0;

/// Sample axes in report order.
const REPORT_ORDER: [Axis; 4] = [Axis::Phi, Axis::Omega, Axis::Chi, Axis::Kappa];

const LABEL_WIDTH: usize = 35;

/// Rendered report plus everything found while building it.
#[derive(Debug, Clone)]
pub struct HeaderReport {
    /// Header after normalisation.
    pub header: ImageHeader,
    /// Formatted report text.
    pub text: String,
    /// Warnings raised by the sanity checks.
    pub warnings: Warnings,
    /// Sample axes with start != end.
    pub oscillating_axes: Vec<Axis>,
}

/// Maps tiny negative values (and `-0.0`) to `+0.0`.
#[must_use]
pub fn snap_negative_zero(value: f64) -> f64 {
    if value <= 0.0 && value > -NEGATIVE_ZERO_TOLERANCE {
        0.0
    } else {
        value
    }
}

/// Shifts a range by whole turns so that a start above 360 lands in [0, 360).
pub fn wrap_full_turns(range: &mut AngleRange) {
    if range.start > FULL_TURN {
        let shift = range.start - range.start % FULL_TURN;
        range.start -= shift;
        range.end -= shift;
    }
}

/// Decimal places used for an oscillation range of the given width.
#[must_use]
pub fn oscillation_precision(width: f64) -> usize {
    if width < 1.0e-4 {
        9
    } else if width < 1.0e-2 {
        7
    } else {
        5
    }
}

/// Applies the angle post-processing in place.
///
/// Sample axes get the negative-zero snap and, when `normalize_angles` is
/// set, whole-turn wrapping. Two-theta only gets the snap.
pub fn normalize_header(header: &mut ImageHeader, normalize_angles: bool) {
    for axis in Axis::SAMPLE {
        let range = header.angle_mut(axis);
        if !range.is_available() {
            continue;
        }
        range.start = snap_negative_zero(range.start);
        range.end = snap_negative_zero(range.end);
        if normalize_angles {
            wrap_full_turns(range);
        }
    }

    let two_theta = &mut header.two_theta;
    two_theta.start = snap_negative_zero(two_theta.start);
    two_theta.end = snap_negative_zero(two_theta.end);
}

/// Sample axes whose start and end differ.
#[must_use]
pub fn oscillating_axes(header: &ImageHeader) -> Vec<Axis> {
    Axis::SAMPLE
        .into_iter()
        .filter(|&axis| {
            let range = header.angle(axis);
            range.is_available() && range.start != range.end
        })
        .collect()
}

/// Names of required geometry items that are still at their sentinel.
#[must_use]
pub fn missing_required_fields(header: &ImageHeader) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if header.distance.is_nan() {
        missing.push("(crystal-to-detector) distance");
    }
    if header.wavelength.is_nan() {
        missing.push("wavelength");
    }
    if header.pixel_size_x.is_nan() || header.pixel_size_y.is_nan() {
        missing.push("pixel size");
    }
    if !int_available(header.array_size_x) || !int_available(header.array_size_y) {
        missing.push("image array size");
    }
    if header.beam_centre_x.is_nan() || header.beam_centre_y.is_nan() {
        missing.push("beam centre");
    }
    missing
}

/// Normalises a copy of the header, checks it and renders the report.
#[must_use]
pub fn render(header: &ImageHeader, options: &ReportOptions) -> HeaderReport {
    let mut warnings = Warnings::new();
    check_angle_ranges(header, options, &mut warnings);

    let mut header = header.clone();
    normalize_header(&mut header, options.normalize_angles);

    let mut text = String::new();
    text.push_str("\n ===== Header information:\n");
    write_general(&mut text, &header, options);
    for axis in REPORT_ORDER {
        write_axis(&mut text, axis, header.angle(axis), &mut warnings);
    }
    if !header.two_theta.start.is_nan() {
        line(
            &mut text,
            "2-Theta angle              [degree]",
            format!("{:.5}", header.two_theta.start),
        );
    }
    write_detector(&mut text, &header);

    for item in missing_required_fields(&header) {
        warnings.record(
            WarningKind::MissingField,
            format!("unable to extract {item} !!!"),
        );
    }

    let oscillating = oscillating_axes(&header);
    match oscillating.len() {
        0 => warnings.record(
            WarningKind::Oscillation,
            "no oscillation axis found: unable to find oscillation axis/angles !!!",
        ),
        1 => {}
        _ => warnings.record(
            WarningKind::Oscillation,
            format!(
                "ambiguous rotation axis: more than one angle has different start/stop values ({})",
                oscillating
                    .iter()
                    .map(|axis| axis.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ),
    }

    if !warnings.is_empty() {
        text.push('\n');
        for warning in &warnings {
            let _ = writeln!(text, " {warning}");
        }
    }

    HeaderReport {
        header,
        text,
        warnings,
        oscillating_axes: oscillating,
    }
}

fn check_angle_ranges(header: &ImageHeader, options: &ReportOptions, warnings: &mut Warnings) {
    for axis in Axis::ALL {
        let start = header.angle(axis).start;
        let note = if options.normalize_angles && axis != Axis::TwoTheta {
            " - this will be normalised in the output"
        } else {
            ""
        };
        if start > FULL_TURN {
            warnings.record(
                WarningKind::SuspiciousValue,
                format!("{axis} angle given with value above 360.0 degree ({start}){note}"),
            );
        } else if start < -FULL_TURN {
            warnings.record(
                WarningKind::SuspiciousValue,
                format!(
                    "{axis} angle given with value below -360.0 degree ({start}) - maybe as a marker for NA/NULL?"
                ),
            );
        }
    }
}

fn write_general(text: &mut String, header: &ImageHeader, options: &ReportOptions) {
    if let Some(ts) = &header.timestamp {
        line(text, "date", ts.to_string());
        if options.verbosity > 0 {
            let epoch = match ts.millis {
                Some(ms) => format!("{}.{ms:03}", ts.epoch_seconds),
                None => ts.epoch_seconds.to_string(),
            };
            line(text, "Time since Epoch          [seconds]", epoch);
        }
    }

    let etime = header.exposure_time;
    if etime > 0.0 {
        let precision = if etime > 0.1 {
            3
        } else if etime > 0.01 {
            4
        } else if etime > 0.001 {
            5
        } else {
            6
        };
        line(
            text,
            "exposure time             [seconds]",
            format!("{etime:.precision$}"),
        );
    }

    if header.flux > 0.0 {
        let precision = if header.flux > 1.0 { 3 } else { 6 };
        line(
            text,
            "flux                      [unknown]",
            format!("{:.precision$}", header.flux),
        );
    }

    if options.show_detector_id {
        if let Some(name) = &header.detector_name {
            line(text, "detector ID", name.clone());
        }
    }
    if !header.distance.is_nan() {
        line(
            text,
            "distance                       [mm]",
            format!("{:.3}", header.distance),
        );
    }
    if !header.wavelength.is_nan() {
        line(
            text,
            "wavelength                      [A]",
            format!("{:.6}", header.wavelength),
        );
    }
    if !header.sensor_thickness.is_nan() {
        line(
            text,
            "sensor thickness               [mm]",
            format!("{:.3}", header.sensor_thickness),
        );
    }
    if let Some(material) = &header.sensor_material {
        line(text, "sensor material", material.clone());
    }
    if !header.polarization.is_nan() {
        line(
            text,
            "fraction of polarization",
            format!("{:.3}", header.polarization),
        );
    }
}

fn write_axis(text: &mut String, axis: Axis, range: &AngleRange, warnings: &mut Warnings) {
    if !range.is_available() {
        return;
    }
    let label = axis.label();
    let fixed = format!("{:<27}[degree]", format!("{label}-angle"));
    let pair = format!("{:<27}[degree]", format!("{label}-angle (start, end)"));

    if range.end > range.start {
        let width = range.width();
        let p = oscillation_precision(width);
        line(text, &pair, format!("{:.p$} {:.p$}", range.start, range.end));
        line(
            text,
            &format!("{:<27}[degree]", format!("Oscillation-angle in {label}")),
            format!("{width:.p$}"),
        );
    } else if range.end < range.start && range.end != 0.0 {
        line(text, &pair, format!("{:.5} {:.5}", range.start, range.end));
        warnings.record(
            WarningKind::Oscillation,
            format!("negative oscillation range for {label}?"),
        );
    } else {
        line(text, &fixed, format!("{:.5}", range.start));
    }
}

fn write_detector(text: &mut String, header: &ImageHeader) {
    if !header.pixel_size_x.is_nan() {
        line(
            text,
            "Pixel size in X                [mm]",
            format!("{:.6}", header.pixel_size_x),
        );
    }
    if !header.pixel_size_y.is_nan() {
        line(
            text,
            "Pixel size in Y                [mm]",
            format!("{:.6}", header.pixel_size_y),
        );
    }
    if int_available(header.array_size_x) {
        line(text, "Number of pixels in X", header.array_size_x.to_string());
    }
    if int_available(header.array_size_y) {
        line(text, "Number of pixels in Y", header.array_size_y.to_string());
    }
    for (name, centre, pixel) in [
        ("X", header.beam_centre_x, header.pixel_size_x),
        ("Y", header.beam_centre_y, header.pixel_size_y),
    ] {
        if centre.is_nan() {
            continue;
        }
        if !pixel.is_nan() {
            line(
                text,
                &format!("Beam centre in {name}               [mm]"),
                format!("{:.3}", centre * pixel),
            );
        }
        line(
            text,
            &format!("Beam centre in {name}            [pixel]"),
            format!("{centre:.3}"),
        );
    }
    if int_available(header.overload) {
        line(text, "Overload value", header.overload.to_string());
    }
}

fn line(text: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(text, " {label:<LABEL_WIDTH$} = {value}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn complete_header() -> ImageHeader {
        let mut h = ImageHeader::empty();
        h.distance = 150.0;
        h.wavelength = 0.9763;
        h.pixel_size_x = 0.075;
        h.pixel_size_y = 0.075;
        h.array_size_x = 4150;
        h.array_size_y = 4371;
        h.beam_centre_x = 2075.5;
        h.beam_centre_y = 2200.25;
        h.omega = AngleRange::new(0.0, 0.1);
        h
    }

    #[test]
    fn test_snap_negative_zero() {
        assert_eq!(snap_negative_zero(-0.00005).to_bits(), 0.0f64.to_bits());
        assert_eq!(snap_negative_zero(-0.0).to_bits(), 0.0f64.to_bits());
        assert_relative_eq!(snap_negative_zero(-0.0001), -0.0001);
        assert_relative_eq!(snap_negative_zero(12.5), 12.5);
        assert!(snap_negative_zero(f64::NAN).is_nan());
    }

    #[test]
    fn test_wrap_full_turns() {
        let mut r = AngleRange::new(725.0, 725.5);
        wrap_full_turns(&mut r);
        assert_relative_eq!(r.start, 5.0);
        assert_relative_eq!(r.end, 5.5);

        let mut r = AngleRange::new(359.0, 361.0);
        wrap_full_turns(&mut r);
        assert_relative_eq!(r.start, 359.0);
        assert_relative_eq!(r.end, 361.0);
    }

    #[test]
    fn test_normalize_only_when_requested() {
        let mut h = complete_header();
        h.phi = AngleRange::new(370.0, 370.0);
        h.two_theta = AngleRange::fixed(-0.00001);

        let mut plain = h.clone();
        normalize_header(&mut plain, false);
        assert_relative_eq!(plain.phi.start, 370.0);
        assert_eq!(plain.two_theta.start.to_bits(), 0.0f64.to_bits());

        normalize_header(&mut h, true);
        assert_relative_eq!(h.phi.start, 10.0);
        assert_relative_eq!(h.phi.end, 10.0);
    }

    #[test]
    fn test_oscillation_precision() {
        assert_eq!(oscillation_precision(0.00005), 9);
        assert_eq!(oscillation_precision(0.005), 7);
        assert_eq!(oscillation_precision(0.1), 5);
    }

    #[test]
    fn test_render_single_axis_has_no_warnings() {
        let report = render(&complete_header(), &ReportOptions::default());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.oscillating_axes, vec![Axis::Omega]);
        assert!(report
            .text
            .contains("Omega-angle (start, end)   [degree] = 0.00000 0.10000"));
        assert!(report.text.contains("Oscillation-angle in Omega [degree] = 0.10000"));
    }

    #[test]
    fn test_render_small_range_uses_more_decimals() {
        let mut h = complete_header();
        h.omega = AngleRange::new(10.0, 10.00005);
        let report = render(&h, &ReportOptions::default());
        assert!(report.text.contains("= 10.000000000 10.000050000"));
    }

    #[test]
    fn test_render_missing_fields_warn_independently() {
        let mut h = complete_header();
        h.distance = f64::NAN;
        h.beam_centre_y = f64::NAN;
        let report = render(&h, &ReportOptions::default());
        assert_eq!(report.warnings.count(WarningKind::MissingField), 2);
        assert!(!report.text.contains("Beam centre in Y"));
    }

    #[test]
    fn test_render_no_oscillation_axis() {
        let mut h = complete_header();
        h.omega = AngleRange::fixed(45.0);
        let report = render(&h, &ReportOptions::default());
        assert!(report.oscillating_axes.is_empty());
        assert_eq!(report.warnings.count(WarningKind::Oscillation), 1);
        assert!(report.text.contains("Omega-angle                [degree] = 45.00000"));
    }

    #[test]
    fn test_render_ambiguous_axis() {
        let mut h = complete_header();
        h.phi = AngleRange::new(0.0, 0.2);
        let report = render(&h, &ReportOptions::default());
        assert_eq!(report.oscillating_axes.len(), 2);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.message.starts_with("ambiguous rotation axis")));
    }

    #[test]
    fn test_render_negative_range() {
        let mut h = complete_header();
        h.omega = AngleRange::new(5.0, 4.0);
        let report = render(&h, &ReportOptions::default());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.message == "negative oscillation range for Omega?"));
    }

    #[test]
    fn test_render_end_zero_is_fixed_angle() {
        let mut h = complete_header();
        h.kappa = AngleRange::new(30.0, 0.0);
        let report = render(&h, &ReportOptions::default());
        assert!(report.text.contains("Kappa-angle                [degree] = 30.00000"));
        assert_eq!(report.oscillating_axes.len(), 2);
    }

    #[test]
    fn test_render_detector_id_is_optional() {
        let mut h = complete_header();
        h.detector_name = Some("E-32-0105".to_string());
        let hidden = render(&h, &ReportOptions::default());
        assert!(!hidden.text.contains("E-32-0105"));
        let shown = render(&h, &ReportOptions::default().with_detector_id(true));
        assert!(shown.text.contains("detector ID"));
        assert!(shown.text.contains("= E-32-0105"));
    }
}
