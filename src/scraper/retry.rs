use std::time::Instant;
use tracing::{error, info, warn};

use crate::cli::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::scraper::breaker::CircuitBreaker;
use crate::scraper::job::ScrapedData;
use crate::strategy::FetchStrategy;
use crate::utils::metrics::MetricsCollector;

/// Fetch one URL with bounded retries, producing exactly one result row.
///
/// Classification is purely by error tag: retryable errors back off
/// linearly (`retry_base_delay` times the attempt number) while attempts
/// remain; a breaker-open rejection aborts immediately, since retrying
/// would defeat the breaker.
pub async fn fetch_with_retry(
    strategy: &dyn FetchStrategy,
    breaker: &CircuitBreaker,
    url: &str,
    host: &str,
    config: &ScraperConfig,
    metrics: &MetricsCollector,
) -> ScrapedData {
    let attempts = config.retry_attempts.max(1);
    let mut attempt = 1u32;

    let err = loop {
        metrics.record_request();
        let started = Instant::now();

        match breaker.execute(strategy.execute(url)).await {
            Ok(page) => {
                let elapsed = started.elapsed();
                metrics
                    .record_success(host, page.status, page.body.len() as u64, elapsed)
                    .await;
                info!(
                    "Scraped {} (status: {}, size: {} bytes, duration: {:?})",
                    url,
                    page.status,
                    page.body.len(),
                    elapsed
                );
                return ScrapedData::from_page(url, &page);
            }
            Err(err @ ScrapeError::BreakerOpen { .. }) => {
                warn!("Circuit breaker open for {}: {}", host, err);
                break err;
            }
            Err(err) => {
                if err.is_retryable() && attempt < attempts {
                    metrics.record_retry();
                    warn!("Retry {} for {}: {}", attempt, url, err);
                    tokio::time::sleep(config.retry_base_delay * attempt).await;
                    attempt += 1;
                    continue;
                }
                break err;
            }
        }
    };

    let status = err.status_code();
    metrics.record_failure(host, status).await;
    error!("Failed to scrape {}: {}", url, err);
    ScrapedData::from_error(url, status, &err)
}
