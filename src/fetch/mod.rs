// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::{fs, time::sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::RetryPolicy;

pub mod source;

pub use source::Source;

/// HTTP client shared by every dataset task.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

/// Fetch the raw text of one dataset.
pub async fn fetch_text(client: &Client, source: &Source, retry: &RetryPolicy) -> Result<String> {
    let text = match source {
        Source::Http(url) => {
            get_text_with_retry(client, url, retry.max_retries, retry.initial_backoff_ms).await?
        }
        Source::File(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
    };
    info!(source = %source, bytes = text.len(), "fetched");
    Ok(text)
}

async fn get_text_core(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))
}

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based): doubles each time, capped.
fn backoff_ms(initial_backoff_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    initial_backoff_ms
        .saturating_mul(factor)
        .min(MAX_BACKOFF_MS)
}

async fn get_text_with_retry(
    client: &Client,
    url: &Url,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_text_core(client, url).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < max_retries => {
                attempts += 1;
                let backoff = backoff_ms(initial_backoff_ms, attempts);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };
    use tempfile::tempdir;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use tracing_subscriber::{fmt, EnvFilter};

    fn init_logging() {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    }

    /// Minimal HTTP/1.1 server: the first `failures` requests get a 503, the
    /// rest get `body` with 200. Returns the URL and a request counter.
    async fn serve(failures: usize, body: &'static str) -> Result<(Url, Arc<AtomicUsize>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, payload) = if n < failures {
                    ("503 Service Unavailable", "")
                } else {
                    ("200 OK", body)
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    payload.len(),
                    payload
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Ok((Url::parse(&format!("http://{}/data.csv", addr))?, hits))
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff_ms: 1,
        }
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1_000);
        assert_eq!(backoff_ms(500, 4), 4_000);
        assert_eq!(backoff_ms(500, 40), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(500, 70), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(u64::MAX, u32::MAX), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(0, 70), 0);
    }

    #[tokio::test]
    async fn test_many_retries_end_in_error() -> Result<()> {
        let (url, hits) = serve(usize::MAX, "").await?;
        let client = build_client(Duration::from_secs(5))?;
        let retry = RetryPolicy {
            max_retries: 70,
            initial_backoff_ms: 0,
        };

        assert!(fetch_text(&client, &Source::Http(url), &retry).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 71);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "a,b\n1,2\n")?;

        let client = build_client(Duration::from_secs(5))?;
        let text = fetch_text(&client, &Source::File(path), &fast_retry(0)).await?;
        assert_eq!(text, "a,b\n1,2\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_missing_file_fails() -> Result<()> {
        let client = build_client(Duration::from_secs(5))?;
        let missing = Source::File(PathBuf::from("/definitely/not/here.csv"));
        let err = fetch_text(&client, &missing, &fast_retry(0))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("here.csv"));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_http_retries_then_succeeds() -> Result<()> {
        init_logging();
        let (url, hits) = serve(2, "x,y\n1,2\n").await?;
        let client = build_client(Duration::from_secs(5))?;

        let text = fetch_text(&client, &Source::Http(url), &fast_retry(3)).await?;
        assert_eq!(text, "x,y\n1,2\n");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_http_gives_up() -> Result<()> {
        init_logging();
        let (url, hits) = serve(usize::MAX, "").await?;
        let client = build_client(Duration::from_secs(5))?;

        assert!(fetch_text(&client, &Source::Http(url), &fast_retry(1))
            .await
            .is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
