//! Goniometer angle reconciliation across acquisition triggers.
//!
//! Each axis is sourced once per file from an ordered list of schema
//! locations; the first one that yields data wins. The per-image series are
//! then sampled for every trigger to fill the header and to classify
//! consecutive triggers as one continuous sweep or independent sweeps. A
//! request for a single image only samples the trigger holding it.

use crate::field::NexusReader;
use crate::{Error, Result};
use nxinfo_core::{AngleRange, Axis, ImageHeader, WarningKind, Warnings};

/// Largest start/end gap (degrees) still treated as a continuous sweep.
pub const CONTINUITY_TOLERANCE: f64 = 0.001;

const DEGREE: &str = "degree";
const DATA_GROUP: &str = "/entry/data";

/// Schema location an axis was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleSource {
    /// `/entry/sample/goniometer/<axis>` with `_end`/`_range_*` companions.
    Goniometer,
    /// `/entry/sample/sample_<axis>/<axis>`.
    LegacyAxisGroup,
    /// `/entry/data/<name>` selected by the group's `axes` attribute.
    DataAxes,
}

impl AngleSource {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AngleSource::Goniometer => "goniometer",
            AngleSource::LegacyAxisGroup => "legacy axis group",
            AngleSource::DataAxes => "data axes",
        }
    }

    /// Sources tried for an axis, in order.
    ///
    /// Omega decides whether the file uses the goniometer schema. Once it
    /// does, the other axes are only looked up there; otherwise they use the
    /// legacy locations. Two-theta only exists in the goniometer schema.
    #[must_use]
    pub fn candidates(axis: Axis, primary_schema: bool) -> &'static [AngleSource] {
        use AngleSource::{DataAxes, Goniometer, LegacyAxisGroup};
        match (axis, primary_schema) {
            (Axis::Omega, _) => &[Goniometer, LegacyAxisGroup, DataAxes],
            (_, true) => &[Goniometer],
            (Axis::TwoTheta, false) => &[],
            (_, false) => &[LegacyAxisGroup, DataAxes],
        }
    }

    fn load(self, reader: &mut NexusReader<'_>, axis: Axis, len: usize) -> Result<Option<AxisSeries>> {
        match self {
            AngleSource::Goniometer => load_goniometer(reader, axis, len),
            AngleSource::LegacyAxisGroup => {
                if axis == Axis::TwoTheta {
                    return Ok(None);
                }
                let name = axis.name();
                let path = format!("/entry/sample/sample_{name}/{name}");
                load_derived(reader, self, &path, len)
            }
            AngleSource::DataAxes => match data_axis_path(reader, axis) {
                Some(path) => load_derived(reader, self, &path, len),
                None => Ok(None),
            },
        }
    }
}

impl std::fmt::Display for AngleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-image start/end angles of one axis for the whole file.
#[derive(Debug, Clone)]
pub struct AxisSeries {
    pub source: AngleSource,
    pub path: String,
    pub start: Vec<f64>,
    pub end: Vec<f64>,
    /// Angular increment per image (0 for a static axis).
    pub increment: f64,
}

impl AxisSeries {
    /// Start/end at a position; a missing end falls back to the start.
    fn at(&self, first: usize, last: usize) -> AngleRange {
        let start = self.start.get(first).copied().unwrap_or(f64::NAN);
        let end = self.end.get(last).copied().unwrap_or(f64::NAN);
        AngleRange::new(start, if end.is_nan() { start } else { end })
    }
}

fn goniometer_path(axis: Axis) -> String {
    match axis {
        Axis::TwoTheta => "/entry/instrument/detector/goniometer/two_theta".to_string(),
        _ => format!("/entry/sample/goniometer/{}", axis.name()),
    }
}

/// Accepted `axes` attribute values for an axis.
#[must_use]
pub fn data_axis_names(axis: Axis) -> &'static [&'static str] {
    match axis {
        Axis::Omega => &["omega", "gonomega"],
        Axis::Kappa => &["kappa", "gonkappa"],
        Axis::Chi => &["chi", "gonchi"],
        Axis::Phi => &["phi", "gonphi"],
        Axis::TwoTheta => &[],
    }
}

fn data_axis_path(reader: &NexusReader<'_>, axis: Axis) -> Option<String> {
    match reader.read_attr_string(DATA_GROUP, "axes") {
        Some(axes) => data_axis_names(axis)
            .iter()
            .find(|name| axes.eq_ignore_ascii_case(name))
            .map(|_| format!("{DATA_GROUP}/{axes}")),
        None if axis == Axis::Omega => Some(format!("{DATA_GROUP}/omega")),
        None => None,
    }
}

/// Difference between the first two stored samples, or 0 for one sample.
fn sample_increment(reader: &mut NexusReader<'_>, path: &str) -> Result<f64> {
    if reader.dataset_len(path).unwrap_or(0) < 2 {
        return Ok(0.0);
    }
    Ok(match reader.read_array::<f64>(path, Some(DEGREE), 2)? {
        Some(v) => v[1] - v[0],
        None => 0.0,
    })
}

fn load_goniometer(reader: &mut NexusReader<'_>, axis: Axis, len: usize) -> Result<Option<AxisSeries>> {
    let base = goniometer_path(axis);
    let Some(start) = reader.read_array::<f64>(&base, Some(DEGREE), len)? else {
        return Ok(None);
    };

    let stored_end = reader.read_array::<f64>(&format!("{base}_end"), Some(DEGREE), len)?;

    let average = format!("{base}_range_average");
    let increment_path = format!("{base}_increment");
    let increment = match reader.read_first_of::<f64>(&[average.as_str(), increment_path.as_str()], Some(DEGREE))? {
        Some(increment) => increment,
        None => match stored_end.as_deref() {
            Some([end, ..]) if !start.is_empty() => end - start[0],
            _ => sample_increment(reader, &base)?,
        },
    };
    if let Some(total) = reader.read_scalar::<f64>(&format!("{base}_range_total"), Some(DEGREE))? {
        tracing::debug!(axis = %axis, total, "total range");
    }

    let end = match stored_end {
        Some(end) => end,
        None => start.iter().map(|s| s + increment).collect(),
    };

    Ok(Some(AxisSeries {
        source: AngleSource::Goniometer,
        path: base,
        start,
        end,
        increment,
    }))
}

fn load_derived(
    reader: &mut NexusReader<'_>,
    source: AngleSource,
    path: &str,
    len: usize,
) -> Result<Option<AxisSeries>> {
    let Some(start) = reader.read_array::<f64>(path, Some(DEGREE), len)? else {
        return Ok(None);
    };
    let increment = sample_increment(reader, path)?;
    let end = start.iter().map(|s| s + increment).collect();
    Ok(Some(AxisSeries {
        source,
        path: path.to_string(),
        start,
        end,
        increment,
    }))
}

/// Images to sample in every trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSelection {
    /// Images per trigger.
    pub per_trigger: usize,
    /// Number of triggers.
    pub triggers: usize,
    /// First zero-based position within a trigger.
    pub first: usize,
    /// Last zero-based position within a trigger.
    pub last: usize,
    /// Trigger holding the header image.
    pub header_trigger: usize,
    /// Position of the header image within its trigger.
    pub header_position: usize,
    /// Every trigger is sampled; otherwise only the header trigger.
    pub whole_triggers: bool,
}

impl ImageSelection {
    /// Whole triggers; the header describes the first image.
    #[must_use]
    pub fn all(per_trigger: usize, triggers: usize) -> Self {
        Self {
            per_trigger,
            triggers,
            first: 0,
            last: per_trigger.saturating_sub(1),
            header_trigger: 0,
            header_position: 0,
            whole_triggers: true,
        }
    }

    /// A single image at a zero-based position in the file.
    #[must_use]
    pub fn single(per_trigger: usize, triggers: usize, position: usize) -> Self {
        let per_trigger = per_trigger.max(1);
        let within = position % per_trigger;
        Self {
            per_trigger,
            triggers,
            first: within,
            last: within,
            header_trigger: position / per_trigger,
            header_position: within,
            whole_triggers: false,
        }
    }

    /// Zero-based position of the header image in the file.
    #[must_use]
    pub fn header_index(&self) -> usize {
        self.header_trigger * self.per_trigger + self.header_position
    }

    /// Triggers whose angles are sampled and classified.
    #[must_use]
    pub fn sampled_triggers(&self) -> std::ops::Range<usize> {
        if self.whole_triggers {
            0..self.triggers
        } else {
            self.header_trigger..self.header_trigger + 1
        }
    }

    /// Number of images in the file.
    #[must_use]
    pub fn total(&self) -> usize {
        self.per_trigger.saturating_mul(self.triggers)
    }
}

/// Start angle of the first and end angle of the last selected image of
/// every trigger, per axis.
#[derive(Debug, Clone)]
struct TriggerAngleTable {
    triggers: usize,
    values: Vec<Vec<f64>>,
}

impl TriggerAngleTable {
    fn new(triggers: usize) -> Result<Self> {
        let len = triggers.checked_mul(2).ok_or(Error::Allocation(triggers))?;
        let mut values = Vec::with_capacity(Axis::ALL.len());
        for _ in Axis::ALL {
            let mut column = Vec::new();
            column
                .try_reserve_exact(len)
                .map_err(|_| Error::Allocation(len))?;
            column.resize(len, f64::NAN);
            values.push(column);
        }
        Ok(Self { triggers, values })
    }

    fn set(&mut self, axis: Axis, trigger: usize, range: AngleRange) {
        let column = &mut self.values[axis.index()];
        column[trigger] = range.start;
        column[trigger + self.triggers] = range.end;
    }

    fn get(&self, axis: Axis, trigger: usize) -> AngleRange {
        let column = &self.values[axis.index()];
        AngleRange::new(column[trigger], column[trigger + self.triggers])
    }
}

/// How a trigger relates to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    First,
    Continuation,
    NewSweep,
}

/// Angles and classification of one trigger.
#[derive(Debug, Clone)]
pub struct TriggerSummary {
    pub index: usize,
    pub continuity: Continuity,
    /// Sweep this trigger belongs to (1-based).
    pub sweep: usize,
    /// Ranges indexed by [`Axis::index`].
    pub angles: [AngleRange; 5],
}

/// Classifies a trigger given the previous trigger's end and this start.
///
/// NaN gaps count as discontinuities.
#[must_use]
pub fn classify_continuity(previous_end: &[f64], start: &[f64]) -> Continuity {
    let continuous = previous_end
        .iter()
        .zip(start)
        .all(|(end, start)| (start - end).abs() < CONTINUITY_TOLERANCE);
    if continuous {
        Continuity::Continuation
    } else {
        Continuity::NewSweep
    }
}

/// Result of reconciling all goniometer axes of a file.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The file stores its angles in the goniometer schema.
    pub primary_schema: bool,
    /// Source used for each axis that was found.
    pub sources: Vec<(Axis, AngleSource)>,
    /// Increment per image, indexed by [`Axis::index`] (NaN if unknown).
    pub increments: [f64; 5],
    pub triggers: Vec<TriggerSummary>,
    /// Number of independent sweeps.
    pub sweeps: usize,
}

impl Reconciliation {
    #[must_use]
    pub fn increment(&self, axis: Axis) -> f64 {
        self.increments[axis.index()]
    }

    #[must_use]
    pub fn source(&self, axis: Axis) -> Option<AngleSource> {
        self.sources
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, source)| *source)
    }

    /// Rotation axis implied by the omega and phi increments.
    pub fn rotation_axis(&self, warnings: &mut Warnings) -> Option<Axis> {
        let omega = self.increment(Axis::Omega);
        let phi = self.increment(Axis::Phi);
        let phi_moves = phi > 0.0;
        if omega > 0.0 && !phi_moves {
            tracing::info!("rotation axis = OMEGA");
            Some(Axis::Omega)
        } else if omega > 0.0 && phi_moves {
            warnings.push(
                WarningKind::Oscillation,
                format!("both omega ({omega}) and phi ({phi}) have a positive increment"),
            );
            None
        } else if phi_moves {
            tracing::info!("rotation axis = PHI");
            Some(Axis::Phi)
        } else {
            None
        }
    }

    /// Reports how the triggers group into sweeps.
    pub fn summarize_sweeps(&self, per_trigger: usize, warnings: &mut Warnings) {
        let triggers = self.triggers.len();
        if triggers < 2 {
            return;
        }
        if self.sweeps == triggers {
            tracing::info!("{triggers} independent datasets of {per_trigger} images");
        } else if self.sweeps == 1 {
            tracing::info!("one dataset of {} images", triggers * per_trigger);
        } else {
            warnings.push(
                WarningKind::SchemaInconsistency,
                format!(
                    "{triggers} triggers form {} sweeps: mixture of continuous and independent sweeps",
                    self.sweeps
                ),
            );
        }
    }
}

/// Sources every axis and fills the header angles of the selected image.
///
/// # Errors
/// Propagates reader errors and returns [`Error::Allocation`] if the
/// per-trigger buffers cannot be allocated.
pub fn reconcile(
    reader: &mut NexusReader<'_>,
    selection: &ImageSelection,
    header: &mut ImageHeader,
) -> Result<Reconciliation> {
    let total = selection.total();
    let mut primary_schema = false;
    let mut series: Vec<(Axis, AxisSeries)> = Vec::new();

    for axis in Axis::ALL {
        for source in AngleSource::candidates(axis, primary_schema) {
            if let Some(found) = source.load(reader, axis, total)? {
                tracing::debug!(axis = %axis, source = %found.source, path = %found.path, "angles found");
                series.push((axis, found));
                break;
            }
        }
        if axis == Axis::Omega {
            primary_schema = matches!(series.first(), Some((Axis::Omega, s)) if s.source == AngleSource::Goniometer);
        }
    }

    let mut table = TriggerAngleTable::new(selection.triggers)?;
    let mut triggers = Vec::with_capacity(selection.triggers);
    let mut sweeps = 0;

    let sampled = selection.sampled_triggers();
    for t in sampled.clone() {
        let offset = t * selection.per_trigger;
        let mut angles = [AngleRange::UNAVAILABLE; 5];
        for (axis, s) in &series {
            let range = s.at(selection.first + offset, selection.last + offset);
            table.set(*axis, t, range);
            angles[axis.index()] = range;
            if t == selection.header_trigger {
                let position = selection.header_position + offset;
                *header.angle_mut(*axis) = s.at(position, position);
            }
        }

        let continuity = if t == sampled.start {
            Continuity::First
        } else {
            let previous: Vec<f64> = series.iter().map(|(a, _)| table.get(*a, t - 1).end).collect();
            let current: Vec<f64> = series.iter().map(|(a, _)| table.get(*a, t).start).collect();
            classify_continuity(&previous, &current)
        };
        if continuity != Continuity::Continuation {
            sweeps += 1;
        }
        if t > sampled.start {
            tracing::info!(trigger = t + 1, ?continuity, sweep = sweeps, "trigger classified");
        }
        triggers.push(TriggerSummary {
            index: t,
            continuity,
            sweep: sweeps,
            angles,
        });
    }

    let mut increments = [f64::NAN; 5];
    for (axis, s) in &series {
        increments[axis.index()] = s.increment;
    }

    Ok(Reconciliation {
        primary_schema,
        sources: series.iter().map(|(a, s)| (*a, s.source)).collect(),
        increments,
        triggers,
        sweeps,
    })
}
