use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header;
use reqwest::Client;
use tracing::debug;

use crate::cli::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::strategy::title::extract_title;
use crate::strategy::{FetchStrategy, FetchedPage};

/// Direct HTTP fetch strategy.
///
/// A single pooled client is built at startup with the configured request
/// timeout and user agent. Compression is enabled and HTTP/2 is negotiated
/// via ALPN where the server supports it.
pub struct HttpStrategy {
    client: Client,
}

impl HttpStrategy {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for HttpStrategy {
    async fn execute(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(ScrapeError::Http {
                url: url.to_string(),
                status,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        let title = extract_title(&body, &content_type);

        Ok(FetchedPage {
            title,
            body,
            status,
            next_url: None,
        })
    }
}

fn classify_reqwest_error(url: &str, err: reqwest::Error) -> ScrapeError {
    if err.is_builder() {
        ScrapeError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        // Timeouts, DNS failures, refused/reset connections: all worth
        // another attempt.
        ScrapeError::transport(url, err)
    }
}
