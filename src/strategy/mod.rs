pub mod headless;
pub mod http;
pub mod title;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::cli::config::ScraperConfig;
use crate::errors::ScrapeError;

pub use headless::HeadlessStrategy;
pub use http::HttpStrategy;

/// Outcome of a single successful fetch, independent of how it was made.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: String,
    pub body: String,
    pub status: u16,
    /// Absolute URL of the next page, when the strategy can detect one.
    pub next_url: Option<String>,
}

/// A single-URL fetch mechanism.
///
/// Implementations perform exactly one attempt per call; retries, admission
/// control, and circuit breaking live above this trait. The strategy is
/// chosen once at startup, never per URL.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn execute(&self, url: &str) -> Result<FetchedPage, ScrapeError>;
}

/// Build the configured fetch strategy.
pub fn build_strategy(config: &ScraperConfig) -> Result<Arc<dyn FetchStrategy>> {
    if config.use_headless {
        info!("Using headless browser strategy via {}", config.webdriver_url);
        Ok(Arc::new(HeadlessStrategy::new(config)))
    } else {
        info!("Using direct HTTP strategy");
        Ok(Arc::new(HttpStrategy::new(config)?))
    }
}
