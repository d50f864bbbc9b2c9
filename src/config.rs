// src/config.rs

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
};

pub const ENV_DATA_DIR: &str = "CHARTFEED_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "CHARTFEED_OUTPUT_DIR";
pub const ENV_MAX_CONCURRENCY: &str = "CHARTFEED_MAX_CONCURRENCY";

pub const MAX_RETRIES_LIMIT: u32 = 20;

/// File stem the run manifest is written under.
pub const MANIFEST_STEM: &str = "manifest";

/// Runtime settings plus the datasets to chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for relative dataset sources.
    pub data_dir: PathBuf,
    /// Where chart JSON and the manifest are written.
    pub output_dir: PathBuf,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

/// One dataset: where to fetch it and how to chart it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Output file stem, also the canvas id the chart is meant for.
    pub id: String,
    /// URL (`http://`, `https://`, `file://`) or a path.
    pub source: String,
    /// Dataset label shown in the legend / tooltip.
    pub title: String,
    pub chart: ChartSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartSpec {
    Line {
        label_field: String,
        value_field: String,
        #[serde(default)]
        x_title: Option<String>,
        #[serde(default)]
        y_title: Option<String>,
    },
    Bar {
        category_field: String,
        #[serde(default)]
        x_title: Option<String>,
        #[serde(default)]
        y_title: Option<String>,
    },
    Pie {
        category_field: String,
    },
    Scatter {
        x_field: String,
        y_field: String,
        #[serde(default)]
        x_title: Option<String>,
        #[serde(default)]
        y_title: Option<String>,
        #[serde(default)]
        y_min: Option<f64>,
        #[serde(default)]
        y_max: Option<f64>,
    },
    Radar {
        label_field: String,
        series: Vec<SeriesSpec>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub field: String,
    /// Legend label; defaults to the field name.
    #[serde(default)]
    pub label: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("charts"),
            max_concurrency: 5,
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
            datasets: default_datasets(),
        }
    }
}

impl Config {
    /// Load from a YAML file if given, otherwise defaults; then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(n) = lookup(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = n
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got {:?}", ENV_MAX_CONCURRENCY, n))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_concurrency > 0, "max_concurrency must be at least 1");
        ensure!(
            self.retry.max_retries <= MAX_RETRIES_LIMIT,
            "retry.max_retries must be at most {}, got {}",
            MAX_RETRIES_LIMIT,
            self.retry.max_retries
        );
        let mut ids = HashSet::new();
        for ds in &self.datasets {
            ensure!(!ds.id.trim().is_empty(), "dataset with source {:?} has an empty id", ds.source);
            // ids become `<output_dir>/<id>.json`
            ensure!(
                !ds.id.contains(['/', '\\']) && !ds.id.contains("..") && ds.id != ".",
                "dataset id {:?} must be a plain file name",
                ds.id
            );
            ensure!(
                !ds.id.eq_ignore_ascii_case(MANIFEST_STEM),
                "dataset id {:?} is reserved for the run manifest",
                ds.id
            );
            ensure!(ids.insert(ds.id.as_str()), "duplicate dataset id {:?}", ds.id);
            if let ChartSpec::Radar { series, .. } = &ds.chart {
                ensure!(!series.is_empty(), "radar dataset {:?} has no series", ds.id);
            }
        }
        Ok(())
    }
}

fn default_datasets() -> Vec<DatasetConfig> {
    vec![
        DatasetConfig {
            id: "websiteTrafficChart".into(),
            source: "website_traffic.csv".into(),
            title: "Daily Website Visits".into(),
            chart: ChartSpec::Line {
                label_field: "Date".into(),
                value_field: "DailyVisits".into(),
                x_title: Some("Date".into()),
                y_title: Some("Number of Visits".into()),
            },
        },
        DatasetConfig {
            id: "buildRecommendationsChart".into(),
            source: "build_recommendations.csv".into(),
            title: "Number of Build Requests".into(),
            chart: ChartSpec::Bar {
                category_field: "Primary Use Case".into(),
                x_title: Some("Primary Use Case".into()),
                y_title: Some("Number of Requests".into()),
            },
        },
        DatasetConfig {
            id: "componentCTRChart".into(),
            source: "component_click_through_rates.csv".into(),
            title: "Component Entry Count".into(),
            chart: ChartSpec::Pie {
                category_field: "Component Type".into(),
            },
        },
        DatasetConfig {
            id: "satisfactionScatterChart".into(),
            source: "user_satisfaction.csv".into(),
            title: "Budget vs. Satisfaction".into(),
            chart: ChartSpec::Scatter {
                x_field: "BudgetSpecified".into(),
                y_field: "SatisfactionScore".into(),
                x_title: Some("Budget Specified ($)".into()),
                y_title: Some("Satisfaction Score (1-5)".into()),
                y_min: Some(1.0),
                y_max: Some(5.0),
            },
        },
        DatasetConfig {
            id: "marketingRadarChart".into(),
            source: "marketing_campaigns.csv".into(),
            title: "Marketing Campaign Performance".into(),
            chart: ChartSpec::Radar {
                label_field: "CampaignName".into(),
                series: vec![
                    SeriesSpec {
                        field: "Cost".into(),
                        label: Some("Cost ($)".into()),
                    },
                    SeriesSpec {
                        field: "Clicks".into(),
                        label: None,
                    },
                    SeriesSpec {
                        field: "Conversions".into(),
                        label: None,
                    },
                ],
            },
        },
    ]
}
