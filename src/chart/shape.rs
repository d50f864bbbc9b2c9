use serde::Serialize;

use crate::process::{parse_float, Record};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Values of `field` as text, for records that have it.
pub fn labels(records: &[Record], field: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get(field))
        .map(str::to_string)
        .collect()
}

/// Values of `field` coerced to numbers; cells that don't coerce are dropped
/// individually, the rest of the column is kept.
pub fn numeric_column(records: &[Record], field: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.get(field))
        .filter_map(parse_float)
        .collect()
}

/// Record count per non-empty `field` value, in first-seen order.
pub fn category_counts(records: &[Record], field: &str) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in records.iter().filter_map(|r| r.get(field)) {
        if value.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(k, _)| k == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value.to_string(), 1)),
        }
    }
    counts
}

/// x/y pairs for records where both fields coerce.
pub fn scatter_points(records: &[Record], x_field: &str, y_field: &str) -> Vec<Point> {
    records
        .iter()
        .filter_map(|r| {
            let x = r.get(x_field).and_then(parse_float)?;
            let y = r.get(y_field).and_then(parse_float)?;
            Some(Point { x, y })
        })
        .collect()
}
