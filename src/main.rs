use anyhow::Result;
use chartfeed::{
    config::Config,
    fetch,
    pipeline::{self, Outcome},
};
use std::{env, path::PathBuf, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::var_os("CHARTFEED_CONFIG").map(PathBuf::from));
    let config = Config::load(config_path.as_deref())?;
    info!(
        datasets = config.datasets.len(),
        data_dir = %config.data_dir.display(),
        output_dir = %config.output_dir.display(),
        "startup"
    );

    // ─── 3) fetch, parse and chart every dataset ─────────────────────
    let client = fetch::build_client(Duration::from_secs(config.request_timeout_secs))?;
    let output_dir = config.output_dir.clone();
    let start = Instant::now();
    let outcomes = pipeline::run(Arc::new(config), client).await?;

    // ─── 4) manifest + summary ───────────────────────────────────────
    let manifest = pipeline::write_manifest(&output_dir, &outcomes).await?;
    let rendered = outcomes
        .iter()
        .filter(|o| matches!(o.outcome, Outcome::Rendered { .. }))
        .count();
    for o in &outcomes {
        if let Outcome::Failed { error } = &o.outcome {
            error!(dataset = %o.id, %error, "no chart");
        }
    }
    info!(
        rendered,
        total = outcomes.len(),
        manifest = %manifest.display(),
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}
