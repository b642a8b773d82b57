//! Non-fatal findings raised while opening and reading a dataset.
//!
//! Warnings go to an injectable [`DiagnosticsSink`]. The default sink logs
//! through `tracing`; tests install a [`RecordingSink`] and assert on what was
//! reported. Suppression of repeated warnings is tracked per open by
//! [`DiagnosticsGate`], so separate datasets never share hidden state.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Which spatial axis a finding refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
        }
    }
}

/// A warning about the file's contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    /// Coordinate spacing along an axis is not constant
    ResolutionDrift { axis: Axis, variable: String, drift: f64 },
    /// Only missing or constant coordinates were found while computing a resolution
    DegenerateCoordinates { variable: String },
    /// A role was claimed by more than one dimension; the last one was kept
    AmbiguousDimension {
        role: String,
        candidates: Vec<String>,
        chosen: String,
    },
}

impl Diagnostic {
    /// Key used for at-most-once suppression within one open.
    fn key(&self) -> String {
        match self {
            Diagnostic::ResolutionDrift { axis, .. } => format!("drift:{}", axis),
            Diagnostic::DegenerateCoordinates { variable } => format!("degenerate:{}", variable),
            Diagnostic::AmbiguousDimension { role, .. } => format!("ambiguous:{}", role),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ResolutionDrift { axis, drift, .. } => {
                write!(f, "{} dimension resolution is not constant: {}", axis, drift)
            }
            Diagnostic::DegenerateCoordinates { variable } => {
                write!(f, "Found only invalid or constant coordinates for {}", variable)
            }
            Diagnostic::AmbiguousDimension {
                role,
                candidates,
                chosen,
            } => write!(
                f,
                "Dimensions {:?} all match role {}; using {}",
                candidates, role, chosen
            ),
        }
    }
}

/// Receives diagnostics
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink: one `tracing` warning per diagnostic
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        warn!(diagnostic = ?diagnostic, "{}", diagnostic);
    }
}

/// Sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    reported: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> Vec<Diagnostic> {
        self.reported.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.reported.lock().len()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.reported.lock().push(diagnostic.clone());
    }
}

/// Forwards each kind of diagnostic to the sink at most once.
///
/// One gate is created per dataset open.
pub struct DiagnosticsGate {
    sink: Arc<dyn DiagnosticsSink>,
    seen: Mutex<HashSet<String>>,
}

impl DiagnosticsGate {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            sink,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a diagnostic with the same key was already reported.
    pub fn already_reported(&self, diagnostic: &Diagnostic) -> bool {
        self.seen.lock().contains(&diagnostic.key())
    }

    /// Report `diagnostic` unless an equivalent one went out already.
    /// Returns true when it was forwarded.
    pub fn report(&self, diagnostic: Diagnostic) -> bool {
        if !self.seen.lock().insert(diagnostic.key()) {
            return false;
        }
        self.sink.report(&diagnostic);
        true
    }
}

impl fmt::Debug for DiagnosticsGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsGate")
            .field("seen", &*self.seen.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drift(axis: Axis, drift: f64) -> Diagnostic {
        Diagnostic::ResolutionDrift {
            axis,
            variable: "lon".to_string(),
            drift,
        }
    }

    #[test]
    fn test_gate_reports_each_axis_once() {
        let sink = Arc::new(RecordingSink::new());
        let gate = DiagnosticsGate::new(sink.clone());

        assert!(gate.report(drift(Axis::X, 0.1)));
        assert!(!gate.report(drift(Axis::X, 0.2)));
        assert!(gate.report(drift(Axis::Y, 0.3)));
        assert!(gate.already_reported(&drift(Axis::Y, 9.0)));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.reported()[0], drift(Axis::X, 0.1));
    }

    #[test]
    fn test_separate_gates_do_not_share_state() {
        let sink = Arc::new(RecordingSink::new());
        let first = DiagnosticsGate::new(sink.clone());
        let second = DiagnosticsGate::new(sink.clone());

        first.report(drift(Axis::X, 0.1));
        second.report(drift(Axis::X, 0.1));
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            drift(Axis::Y, 0.5).to_string(),
            "Y dimension resolution is not constant: 0.5"
        );
    }
}
