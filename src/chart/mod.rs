// src/chart/mod.rs
//! Turns parsed records into chart configurations for the charting library.
//!
//! Each builder selects its fields, coerces what needs to be numeric and
//! returns `None` (with a log line saying why) when there is nothing worth
//! drawing.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::config::{ChartSpec, DatasetConfig, SeriesSpec};
use crate::process::Record;

pub mod shape;

pub use shape::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Scatter,
    Radar,
}

impl ChartSpec {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSpec::Line { .. } => ChartKind::Line,
            ChartSpec::Bar { .. } => ChartKind::Bar,
            ChartSpec::Pie { .. } => ChartKind::Pie,
            ChartSpec::Scatter { .. } => ChartKind::Scatter,
            ChartSpec::Radar { .. } => ChartKind::Radar,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Series,
    /// Colours and other per-dataset styling, passed through as-is.
    #[serde(flatten)]
    pub style: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Series {
    Values(Vec<f64>),
    Points(Vec<Point>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Values(v) => v.len(),
            Series::Points(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChartConfig {
    /// Total number of plotted values across datasets.
    pub fn point_count(&self) -> usize {
        self.data.datasets.iter().map(|d| d.data.len()).sum()
    }
}

const RED: (u8, u8, u8) = (255, 99, 132);
const BLUE: (u8, u8, u8) = (54, 162, 235);
const YELLOW: (u8, u8, u8) = (255, 206, 86);
const TEAL: (u8, u8, u8) = (75, 192, 192);
const PURPLE: (u8, u8, u8) = (153, 102, 255);

const CATEGORY_PALETTE: [(u8, u8, u8); 5] = [RED, BLUE, YELLOW, TEAL, PURPLE];
const SERIES_PALETTE: [(u8, u8, u8); 5] = [RED, BLUE, TEAL, YELLOW, PURPLE];

fn rgb((r, g, b): (u8, u8, u8)) -> String {
    format!("rgb({}, {}, {})", r, g, b)
}

fn rgba((r, g, b): (u8, u8, u8), alpha: f32) -> String {
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}

fn style(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn axis_title(title: &Option<String>, fallback: &str) -> Value {
    json!({ "display": true, "text": title.as_deref().unwrap_or(fallback) })
}

/// Build the chart for `dataset` from its parsed records.
pub fn build(dataset: &DatasetConfig, records: &[Record]) -> Option<ChartConfig> {
    let chart = match &dataset.chart {
        ChartSpec::Line {
            label_field,
            value_field,
            x_title,
            y_title,
        } => line(
            &dataset.title,
            records,
            label_field,
            value_field,
            axis_title(x_title, label_field),
            axis_title(y_title, value_field),
        ),
        ChartSpec::Bar {
            category_field,
            x_title,
            y_title,
        } => categorical(
            ChartKind::Bar,
            &dataset.title,
            records,
            category_field,
            json!({
                "responsive": true,
                "maintainAspectRatio": false,
                "indexAxis": "x",
                "scales": {
                    "y": { "beginAtZero": true, "title": axis_title(y_title, "Count") },
                    "x": { "title": axis_title(x_title, category_field) }
                },
                "plugins": { "legend": { "display": false } }
            }),
        ),
        ChartSpec::Pie { category_field } => categorical(
            ChartKind::Pie,
            &dataset.title,
            records,
            category_field,
            json!({
                "responsive": true,
                "maintainAspectRatio": false,
                "plugins": { "legend": { "position": "top" } }
            }),
        ),
        ChartSpec::Scatter {
            x_field,
            y_field,
            x_title,
            y_title,
            y_min,
            y_max,
        } => {
            let mut y_axis = json!({ "beginAtZero": false, "title": axis_title(y_title, y_field) });
            if let Some(min) = y_min {
                y_axis["min"] = json!(min);
            }
            if let Some(max) = y_max {
                y_axis["max"] = json!(max);
            }
            scatter(
                &dataset.title,
                records,
                x_field,
                y_field,
                json!({
                    "responsive": true,
                    "maintainAspectRatio": false,
                    "scales": {
                        "y": y_axis,
                        "x": {
                            "beginAtZero": true,
                            "type": "linear",
                            "position": "bottom",
                            "title": axis_title(x_title, x_field)
                        }
                    }
                }),
            )
        }
        ChartSpec::Radar {
            label_field,
            series,
        } => radar(&dataset.id, records, label_field, series),
    };

    if chart.is_none() {
        debug!(dataset = %dataset.id, kind = ?dataset.chart.kind(), "no chart built");
    }
    chart
}

fn line(
    title: &str,
    records: &[Record],
    label_field: &str,
    value_field: &str,
    x_title: Value,
    y_title: Value,
) -> Option<ChartConfig> {
    let labels = shape::labels(records, label_field);
    let values = shape::numeric_column(records, value_field);
    debug!(labels = labels.len(), values = values.len(), "line data");

    if labels.is_empty() || values.is_empty() || labels.len() != values.len() {
        return None;
    }

    Some(ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels,
            datasets: vec![Dataset {
                label: title.to_string(),
                data: Series::Values(values),
                style: style(json!({ "borderColor": rgb(TEAL), "tension": 0.1 })),
            }],
        },
        options: json!({
            "responsive": true,
            "maintainAspectRatio": false,
            "scales": {
                "y": { "beginAtZero": true, "title": y_title },
                "x": { "title": x_title }
            }
        }),
    })
}

fn categorical(
    kind: ChartKind,
    title: &str,
    records: &[Record],
    category_field: &str,
    options: Value,
) -> Option<ChartConfig> {
    let counts = shape::category_counts(records, category_field);
    debug!(categories = counts.len(), "category counts");
    if counts.is_empty() {
        return None;
    }

    let alpha = if kind == ChartKind::Pie { 0.7 } else { 0.6 };
    let colours = CATEGORY_PALETTE.iter().cycle().take(counts.len());
    let background: Vec<String> = colours.clone().map(|&c| rgba(c, alpha)).collect();
    let border: Vec<String> = colours.map(|&c| rgba(c, 1.0)).collect();
    let (labels, values): (Vec<String>, Vec<f64>) =
        counts.into_iter().map(|(k, n)| (k, n as f64)).unzip();

    Some(ChartConfig {
        kind,
        data: ChartData {
            labels,
            datasets: vec![Dataset {
                label: title.to_string(),
                data: Series::Values(values),
                style: style(json!({
                    "backgroundColor": background,
                    "borderColor": border,
                    "borderWidth": 1
                })),
            }],
        },
        options,
    })
}

fn scatter(
    title: &str,
    records: &[Record],
    x_field: &str,
    y_field: &str,
    options: Value,
) -> Option<ChartConfig> {
    let points = shape::scatter_points(records, x_field, y_field);
    debug!(points = points.len(), "scatter data");
    if points.is_empty() {
        return None;
    }

    Some(ChartConfig {
        kind: ChartKind::Scatter,
        data: ChartData {
            labels: Vec::new(),
            datasets: vec![Dataset {
                label: title.to_string(),
                data: Series::Points(points),
                style: style(json!({
                    "backgroundColor": rgba(PURPLE, 0.6),
                    "borderColor": rgba(PURPLE, 1.0),
                    "pointRadius": 5,
                    "pointHoverRadius": 7
                })),
            }],
        },
        options,
    })
}

fn radar(
    id: &str,
    records: &[Record],
    label_field: &str,
    series: &[SeriesSpec],
) -> Option<ChartConfig> {
    let labels = shape::labels(records, label_field);
    if labels.is_empty() {
        error!(dataset = %id, field = %label_field, "no labels for radar chart");
        return None;
    }

    let mut datasets = Vec::with_capacity(series.len());
    for (i, spec) in series.iter().enumerate() {
        let values = shape::numeric_column(records, &spec.field);
        if values.len() != labels.len() {
            error!(
                dataset = %id,
                field = %spec.field,
                values = values.len(),
                labels = labels.len(),
                "radar series does not line up with labels"
            );
            return None;
        }
        let colour = SERIES_PALETTE[i % SERIES_PALETTE.len()];
        datasets.push(Dataset {
            label: spec.label.clone().unwrap_or_else(|| spec.field.clone()),
            data: Series::Values(values),
            style: style(json!({
                "fill": true,
                "backgroundColor": rgba(colour, 0.2),
                "borderColor": rgb(colour),
                "pointBackgroundColor": rgb(colour),
                "pointBorderColor": "#fff",
                "pointHoverBackgroundColor": "#fff",
                "pointHoverBorderColor": rgb(colour)
            })),
        });
    }

    Some(ChartConfig {
        kind: ChartKind::Radar,
        data: ChartData { labels, datasets },
        options: json!({
            "responsive": true,
            "maintainAspectRatio": false,
            "elements": { "line": { "borderWidth": 3 } },
            "scales": { "r": {} },
            "plugins": { "legend": { "position": "top" } }
        }),
    })
}
