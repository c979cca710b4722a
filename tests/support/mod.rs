#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use scraper_service::errors::ScrapeError;
use scraper_service::strategy::{FetchStrategy, FetchedPage};

pub fn page(title: &str) -> FetchedPage {
    FetchedPage {
        title: title.to_string(),
        body: format!("<html><head><title>{}</title></head></html>", title),
        status: 200,
        next_url: None,
    }
}

pub fn page_with_next(title: &str, next_url: &str) -> FetchedPage {
    FetchedPage {
        next_url: Some(next_url.to_string()),
        ..page(title)
    }
}

pub fn http_error(url: &str, status: u16) -> ScrapeError {
    ScrapeError::Http {
        url: url.to_string(),
        status,
    }
}

/// Strategy double that replays scripted outcomes per URL and records how
/// it was driven: total calls and the highest observed concurrency.
#[derive(Default)]
pub struct ScriptedStrategy {
    scripts: Mutex<HashMap<String, VecDeque<Result<FetchedPage, ScrapeError>>>>,
    calls: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
    delay: Option<Duration>,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch holds its in-flight slot for this long, making
    /// concurrency observable.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue the outcomes returned for successive fetches of `url`.
    /// URLs without a script succeed with a default page.
    pub async fn script(&self, url: &str, outcomes: Vec<Result<FetchedPage, ScrapeError>>) {
        let mut scripts = self.scripts.lock().await;
        scripts.insert(url.to_string(), outcomes.into());
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u64 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchStrategy for ScriptedStrategy {
    async fn execute(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut scripts = self.scripts.lock().await;
            scripts.get_mut(url).and_then(|queue| queue.pop_front())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome.unwrap_or_else(|| Ok(page("Default Title")))
    }
}
