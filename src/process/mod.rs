// src/process/mod.rs
pub mod diagnostics;
pub mod record;
pub mod utils;

pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, TracingSink};
pub use record::Record;
pub use utils::parse_float;

/// Parse comma-separated text into records keyed by the header row.
///
/// - The whole text is trimmed and split on `\n`; lines that are blank after
///   trimming are dropped and never counted.
/// - The first remaining line is the header. Blank header cells keep their
///   position but produce no key.
/// - Every other line becomes a record only if its field count equals the
///   header's; otherwise the row is dropped whole.
/// - Duplicate header names keep the first position and the last value.
///
/// Never fails: anomalies go to `sink` and the result is empty or partial.
pub fn parse(raw_text: Option<&str>, sink: &dyn DiagnosticSink) -> Vec<Record> {
    let Some(raw_text) = raw_text else {
        sink.report(Diagnostic::NullInput);
        return Vec::new();
    };

    let lines: Vec<&str> = raw_text
        .trim_matches(is_blank)
        .split('\n')
        .filter(|line| !line.trim_matches(is_blank).is_empty())
        .collect();

    if lines.len() < 2 {
        sink.report(Diagnostic::InsufficientLines {
            lines: lines.len(),
            raw: raw_text.to_string(),
        });
        return Vec::new();
    }

    let header = split_fields(lines[0]);
    let mut records = Vec::with_capacity(lines.len() - 1);

    for (i, line) in lines.iter().enumerate().skip(1) {
        let row = i + 1;
        let values = split_fields(line);

        if values.len() != header.len() {
            sink.report(Diagnostic::RowShapeMismatch {
                row,
                values: values.len(),
                header: header.len(),
                line: line.to_string(),
            });
            continue;
        }

        let mut record = Record::with_capacity(header.len());
        for (index, (name, value)) in header.iter().zip(&values).enumerate() {
            if name.is_empty() {
                sink.report(Diagnostic::BlankHeader { index, row });
                continue;
            }
            record.insert(name, value);
        }
        records.push(record);
    }

    records
}

/// [`parse`] with diagnostics sent to `tracing`.
pub fn parse_csv(raw_text: &str) -> Vec<Record> {
    parse(Some(raw_text), &TracingSink)
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(|field| field.trim_matches(is_blank)).collect()
}

/// Whitespace plus the byte-order mark, which Excel and friends prepend.
fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}
