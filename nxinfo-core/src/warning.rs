//! Soft diagnostics collected during extraction and reporting.
//!
//! Warnings never stop processing of the current file. Each one is emitted
//! through `tracing` when it is recorded and kept for the caller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Category of a soft diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WarningKind {
    /// A field could not be sourced; its sentinel is kept.
    MissingField,
    /// Two sources disagree (e.g. declared vs discovered image count).
    SchemaInconsistency,
    /// A stored unit differs from the expected one without a known factor.
    UnitMismatch,
    /// A value was found but looks implausible.
    SuspiciousValue,
    /// Rotation axis could not be determined unambiguously.
    Oscillation,
}

/// One soft diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WARNING: {}", self.message)
    }
}

/// Ordered list of warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning and logs it.
    pub fn push(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(kind = ?kind, "{message}");
        self.items.push(Warning { kind, message });
    }

    /// Records a warning without logging it.
    ///
    /// Used for diagnostics that are printed as part of a report.
    pub fn record(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.items.push(Warning {
            kind,
            message: message.into(),
        });
    }

    /// Appends warnings recorded elsewhere without logging them again.
    pub fn extend(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of warnings of one kind.
    #[must_use]
    pub fn count(&self, kind: WarningKind) -> usize {
        self.items.iter().filter(|w| w.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
