// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Semaphore, task::JoinSet, time::Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    chart,
    config::{Config, DatasetConfig, MANIFEST_STEM},
    fetch::{self, Source},
    process,
};

/// How one dataset's fetch → parse → chart run ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Rendered { path: PathBuf, points: usize },
    /// The source produced empty or whitespace-only text.
    NoData,
    /// The text parsed to zero records.
    NoRecords,
    /// Records existed but the chart's fields gave nothing to plot.
    NoChart,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetOutcome {
    pub id: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    generated_at: DateTime<Utc>,
    datasets: &'a [DatasetOutcome],
}

/// Run every configured dataset concurrently. Datasets never affect each
/// other: a failure (or panic) in one shows up only in its own outcome.
/// Outcomes come back in configuration order.
#[instrument(level = "info", skip_all, fields(datasets = config.datasets.len()))]
pub async fn run(config: Arc<Config>, client: Client) -> Result<Vec<DatasetOutcome>> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;

    let sem = Arc::new(Semaphore::new(config.max_concurrency));
    let mut tasks = JoinSet::new();

    for (index, dataset) in config.datasets.iter().enumerate() {
        let config = Arc::clone(&config);
        let client = client.clone();
        let sem = sem.clone();
        let dataset = dataset.clone();

        tasks.spawn(async move {
            let _permit = sem.acquire().await.ok();
            let start = Instant::now();
            let outcome = match process_dataset(&client, &config, &dataset).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(dataset = %dataset.id, error = %format!("{:#}", e), "dataset failed");
                    Outcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            };
            debug!(dataset = %dataset.id, elapsed = ?start.elapsed(), "dataset finished");
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<Outcome>> = vec![None; config.datasets.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => error!(error = %e, "dataset task aborted"),
        }
    }

    Ok(config
        .datasets
        .iter()
        .zip(slots)
        .map(|(dataset, slot)| DatasetOutcome {
            id: dataset.id.clone(),
            outcome: slot.unwrap_or_else(|| Outcome::Failed {
                error: "task aborted".to_string(),
            }),
        })
        .collect())
}

#[instrument(level = "info", skip_all, fields(dataset = %dataset.id))]
async fn process_dataset(
    client: &Client,
    config: &Config,
    dataset: &DatasetConfig,
) -> Result<Outcome> {
    let source = Source::resolve(&dataset.source, &config.data_dir)?;
    let text = fetch::fetch_text(client, &source, &config.retry).await?;
    if text.trim().is_empty() {
        warn!(source = %source, "no data");
        return Ok(Outcome::NoData);
    }

    // parsing is synchronous; keep it off the async workers
    let records = tokio::task::spawn_blocking(move || process::parse_csv(&text))
        .await
        .context("parse task")?;
    if records.is_empty() {
        warn!(source = %source, "no records parsed");
        return Ok(Outcome::NoRecords);
    }
    debug!(records = records.len(), "parsed");

    let Some(chart) = chart::build(dataset, &records) else {
        warn!(kind = ?dataset.chart.kind(), "nothing to plot");
        return Ok(Outcome::NoChart);
    };

    let path = config.output_dir.join(format!("{}.json", dataset.id));
    let json = serde_json::to_string_pretty(&chart)?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    let points = chart.point_count();
    info!(path = %path.display(), points, "chart written");
    Ok(Outcome::Rendered { path, points })
}

/// Write `manifest.json` summarising a run. Returns its path.
pub async fn write_manifest(output_dir: &Path, outcomes: &[DatasetOutcome]) -> Result<PathBuf> {
    let manifest = Manifest {
        generated_at: Utc::now(),
        datasets: outcomes,
    };
    let path = output_dir.join(format!("{}.json", MANIFEST_STEM));
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChartSpec, RetryPolicy};
    use std::time::Duration;
    use tempfile::tempdir;
    use tracing_subscriber::{fmt, EnvFilter};

    fn init_logging() {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    }

    fn line_dataset(id: &str, source: &str) -> DatasetConfig {
        DatasetConfig {
            id: id.into(),
            source: source.into(),
            title: "Visits".into(),
            chart: ChartSpec::Line {
                label_field: "Date".into(),
                value_field: "DailyVisits".into(),
                x_title: None,
                y_title: None,
            },
        }
    }

    #[tokio::test]
    async fn test_one_bad_dataset_does_not_stop_the_rest() -> Result<()> {
        init_logging();
        let data = tempdir()?;
        let out = tempdir()?;
        std::fs::write(
            data.path().join("good.csv"),
            "Date,DailyVisits\n2024-01-01,10\n2024-01-02,12\n",
        )?;
        std::fs::write(data.path().join("header_only.csv"), "Date,DailyVisits\n")?;
        std::fs::write(data.path().join("blank.csv"), "  \n\n")?;
        std::fs::write(data.path().join("wrong_fields.csv"), "A,B\n1,2\n")?;

        let config = Config {
            data_dir: data.path().to_path_buf(),
            output_dir: out.path().join("charts"),
            max_concurrency: 2,
            request_timeout_secs: 5,
            retry: RetryPolicy {
                max_retries: 0,
                initial_backoff_ms: 1,
            },
            datasets: vec![
                line_dataset("missing", "missing.csv"),
                line_dataset("good", "good.csv"),
                line_dataset("header_only", "header_only.csv"),
                line_dataset("blank", "blank.csv"),
                line_dataset("wrong_fields", "wrong_fields.csv"),
            ],
        };

        let client = fetch::build_client(Duration::from_secs(5))?;
        let outcomes = run(Arc::new(config), client).await?;

        let ids: Vec<_> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["missing", "good", "header_only", "blank", "wrong_fields"]);

        assert!(matches!(outcomes[0].outcome, Outcome::Failed { .. }));
        let good_path = out.path().join("charts").join("good.json");
        assert_eq!(
            outcomes[1].outcome,
            Outcome::Rendered {
                path: good_path.clone(),
                points: 2
            }
        );
        assert_eq!(outcomes[2].outcome, Outcome::NoRecords);
        assert_eq!(outcomes[3].outcome, Outcome::NoData);
        assert_eq!(outcomes[4].outcome, Outcome::NoChart);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&good_path)?)?;
        assert_eq!(written["type"], "line");
        assert_eq!(written["data"]["labels"][1], "2024-01-02");
        Ok(())
    }

    #[tokio::test]
    async fn test_reserved_id_is_refused_before_writing() -> Result<()> {
        let out = tempdir()?;
        let config = Config {
            output_dir: out.path().join("charts"),
            datasets: vec![line_dataset("manifest", "good.csv")],
            ..Config::default()
        };

        let client = fetch::build_client(Duration::from_secs(5))?;
        assert!(run(Arc::new(config), client).await.is_err());
        assert!(!out.path().join("charts").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_manifest_lists_outcomes() -> Result<()> {
        let out = tempdir()?;
        let outcomes = vec![
            DatasetOutcome {
                id: "a".into(),
                outcome: Outcome::Rendered {
                    path: out.path().join("a.json"),
                    points: 4,
                },
            },
            DatasetOutcome {
                id: "b".into(),
                outcome: Outcome::Failed {
                    error: "boom".into(),
                },
            },
        ];

        let path = write_manifest(out.path(), &outcomes).await?;
        let manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert!(manifest["generated_at"].is_string());
        assert_eq!(manifest["datasets"][0]["status"], "rendered");
        assert_eq!(manifest["datasets"][0]["points"], 4);
        assert_eq!(manifest["datasets"][1]["status"], "failed");
        assert_eq!(manifest["datasets"][1]["error"], "boom");
        Ok(())
    }
}
