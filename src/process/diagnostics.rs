use std::{
    fmt,
    sync::{Mutex, PoisonError},
};
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    /// No parse anomaly is an error today; `TracingSink` still maps it to `error!`.
    Error,
}

/// An anomaly found while parsing. Parsing never fails; it reports these instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// No text was supplied at all.
    NullInput,
    /// Fewer than two non-empty lines (header + data). Carries the raw text.
    InsufficientLines { lines: usize, raw: String },
    /// Blank header cell at `index`, seen while building display row `row`.
    BlankHeader { index: usize, row: usize },
    /// Data row `row` (1-based display index) dropped for a field count mismatch.
    RowShapeMismatch {
        row: usize,
        values: usize,
        header: usize,
        line: String,
    },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::NullInput => Severity::Info,
            Diagnostic::InsufficientLines { .. }
            | Diagnostic::BlankHeader { .. }
            | Diagnostic::RowShapeMismatch { .. } => Severity::Warning,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NullInput => write!(f, "attempted to parse null CSV data"),
            Diagnostic::InsufficientLines { lines, raw } => write!(
                f,
                "CSV data has {} usable line(s), need header + data; content: {:?}",
                lines, raw
            ),
            Diagnostic::BlankHeader { index, row } => {
                write!(f, "blank header at index {} in row {}", index, row)
            }
            Diagnostic::RowShapeMismatch {
                row,
                values,
                header,
                line,
            } => write!(
                f,
                "skipping malformed row {}: number of values ({}) does not match header length ({}); line: {:?}",
                row, values, header, line
            ),
        }
    }
}

/// Receiver for parse diagnostics.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Info => info!(target: "chartfeed::parse", "{}", diagnostic),
            Severity::Warning => warn!(target: "chartfeed::parse", "{}", diagnostic),
            Severity::Error => error!(target: "chartfeed::parse", "{}", diagnostic),
        }
    }
}

/// Keeps every diagnostic in memory, in report order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    seen: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything collected so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_taxonomy() {
        assert_eq!(Diagnostic::NullInput.severity(), Severity::Info);
        assert_eq!(
            Diagnostic::BlankHeader { index: 1, row: 2 }.severity(),
            Severity::Warning
        );
        assert_eq!(
            Diagnostic::InsufficientLines {
                lines: 1,
                raw: "a,b".into()
            }
            .severity(),
            Severity::Warning
        );
    }

    #[test]
    fn test_mismatch_message_names_counts() {
        let d = Diagnostic::RowShapeMismatch {
            row: 3,
            values: 4,
            header: 2,
            line: "1,2,3,4".into(),
        };
        let msg = d.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("(4)"));
        assert!(msg.contains("(2)"));
        assert!(msg.contains("1,2,3,4"));
    }

    #[test]
    fn test_tracing_sink_accepts_every_kind() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let sink = TracingSink;
        sink.report(Diagnostic::NullInput);
        sink.report(Diagnostic::BlankHeader { index: 0, row: 2 });
        sink.report(Diagnostic::RowShapeMismatch {
            row: 2,
            values: 1,
            header: 2,
            line: "1".into(),
        });
    }

    #[test]
    fn test_collecting_sink_drains() {
        let sink = CollectingSink::new();
        sink.report(Diagnostic::NullInput);
        assert_eq!(sink.take(), vec![Diagnostic::NullInput]);
        assert!(sink.take().is_empty());
    }
}
