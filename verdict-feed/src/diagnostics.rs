//! Diagnostic channel for data-loss conditions
//!
//! Every condition that drops or degrades data is pushed here. Each push is
//! logged at `warn` immediately and kept for the cycle report.

use std::fmt;
use tracing::warn;

/// A single data-loss or degradation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A slice could not be fetched or decoded
    TransportFailure { slice: String, reason: String },

    /// A row lacked a required field and was skipped
    MalformedRecord {
        slice: String,
        index: usize,
        reason: String,
    },

    /// A defendant had a single record and was not rendered
    UnpairedDefendant { name: String },

    /// A defendant had more than two records; extras were ignored
    OversizedGroup { name: String, extra: usize },

    /// A verdict code outside the active table rendered as an empty label
    UnknownCode { name: String, code: String },

    /// The config slice did not name a usable sheet
    ConfigSlice { reason: String },
}

/// Diagnostic class, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    TransportFailure,
    MalformedRecord,
    UnpairedDefendant,
    OversizedGroup,
    UnknownCode,
    ConfigSlice,
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::TransportFailure { .. } => DiagnosticKind::TransportFailure,
            Diagnostic::MalformedRecord { .. } => DiagnosticKind::MalformedRecord,
            Diagnostic::UnpairedDefendant { .. } => DiagnosticKind::UnpairedDefendant,
            Diagnostic::OversizedGroup { .. } => DiagnosticKind::OversizedGroup,
            Diagnostic::UnknownCode { .. } => DiagnosticKind::UnknownCode,
            Diagnostic::ConfigSlice { .. } => DiagnosticKind::ConfigSlice,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TransportFailure { slice, reason } => {
                write!(f, "slice '{}' failed: {}", slice, reason)
            }
            Diagnostic::MalformedRecord {
                slice,
                index,
                reason,
            } => write!(f, "skipped row {} of slice '{}': {}", index, slice, reason),
            Diagnostic::UnpairedDefendant { name } => {
                write!(f, "'{}' has a single record; not rendered", name)
            }
            Diagnostic::OversizedGroup { name, extra } => {
                write!(f, "'{}' has {} record(s) beyond the pair; ignored", name, extra)
            }
            Diagnostic::UnknownCode { name, code } => {
                write!(f, "unknown verdict code '{}' for '{}'", code, name)
            }
            Diagnostic::ConfigSlice { reason } => write!(f, "config slice unusable: {}", reason),
        }
    }
}

/// Per-cycle diagnostic collector
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(kind = ?diagnostic.kind(), "{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind() == kind).count()
    }

    /// Rows skipped for missing fields
    pub fn malformed_count(&self) -> usize {
        self.count(DiagnosticKind::MalformedRecord)
    }
}
