use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::ScrapeRow;
use crate::settings::Settings;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status(code) => *code == 429 || (500..=599).contains(code),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
        }
    }
}

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

pub fn client(settings: &Settings) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

/// Fetch pages concurrently, saving each result to DB as it arrives.
pub async fn fetch_pages_streaming(
    conn: &Connection,
    settings: &Settings,
    pages: Vec<(i64, String)>,
) -> Result<FetchStats> {
    let client = client(settings)?;
    let concurrency = settings.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let retry = Retry {
        max_retries: settings.max_retries,
        base_backoff: Duration::from_millis(settings.base_backoff_ms),
    };
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Workers send results, this task writes them
    let (tx, mut rx) = tokio::sync::mpsc::channel::<ScrapeRow>(concurrency * 2);

    for (page_id, url) in pages {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let row = fetch_with_retry(&client, retry, page_id, &url).await;
            let _ = tx.send(row).await;
        });
    }

    // rx closes once every spawned task has dropped its sender
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    let mut insert_stmt = conn.prepare(
        "INSERT INTO page_data (page_id, url, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut update_stmt = conn.prepare(
        "UPDATE pages SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
    )?;

    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }
        save_one(&mut insert_stmt, &mut update_stmt, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

fn save_one(
    insert: &mut rusqlite::Statement,
    update: &mut rusqlite::Statement,
    row: &ScrapeRow,
) -> Result<()> {
    insert.execute(rusqlite::params![
        row.page_id, row.url, row.html, row.status, row.error, row.latency_ms,
    ])?;
    update.execute(rusqlite::params![row.page_id])?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Retry {
    max_retries: u32,
    base_backoff: Duration,
}

impl Retry {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt)
    }
}

/// Never fails: fetch errors become an error row so the page is still marked visited.
async fn fetch_with_retry(client: &reqwest::Client, retry: Retry, page_id: i64, url: &str) -> ScrapeRow {
    let start = Instant::now();
    let mut attempt = 0;

    let outcome = loop {
        match fetch_one(client, url).await {
            Ok(page) => break Ok(page),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let backoff = retry.backoff(attempt);
                warn!(
                    "Retryable error on {} ({}), attempt {}/{}, backing off {:.1}s",
                    url,
                    e,
                    attempt + 1,
                    retry.max_retries,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => break Err(e),
        }
    };
    let latency_ms = Some(start.elapsed().as_millis() as i64);

    match outcome {
        Ok((status, html)) => ScrapeRow {
            page_id,
            url: url.to_string(),
            html: Some(html),
            status: Some(status as i32),
            error: None,
            latency_ms,
        },
        Err(e) => {
            warn!("Fetch failed for {}: {}", url, e);
            ScrapeRow {
                page_id,
                url: url.to_string(),
                html: None,
                status: match e {
                    FetchError::Status(code) => Some(code as i32),
                    FetchError::Http(_) => None,
                },
                error: Some(e.to_string()),
                latency_ms,
            }
        }
    }
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<(u16, String), FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok((status.as_u16(), response.text().await?))
}

/// Fetch a single page's HTML.
pub async fn fetch_single_page(settings: &Settings, url: &str) -> Result<String> {
    let client = client(settings)?;
    let (_, html) = fetch_one(&client, url).await?;
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(FetchError::Status(429).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Status(403).is_retryable());
    }

    #[test]
    fn exponential_backoff() {
        let retry = Retry {
            max_retries: 3,
            base_backoff: Duration::from_millis(2000),
        };
        assert_eq!(retry.backoff(0), Duration::from_millis(2000));
        assert_eq!(retry.backoff(1), Duration::from_millis(4000));
        assert_eq!(retry.backoff(2), Duration::from_millis(8000));
    }
}
