use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};
use url::Url;

use crate::cli::config::ScraperConfig;
use crate::errors::{validate_url, ScrapeError};
use crate::scraper::breaker::BreakerStats;
use crate::scraper::hosts::HostRegistry;
use crate::scraper::job::{Job, JobStatus, ScrapedData};
use crate::scraper::retry::fetch_with_retry;
use crate::storage::JobStore;
use crate::strategy::FetchStrategy;
use crate::utils::metrics::{MetricsCollector, MetricsSnapshot};

/// Drives scraping jobs to completion.
///
/// Batch requests fan out one task per URL, all sharing the job deadline,
/// the global admission semaphore, and the per-host breakers. Pagination
/// requests walk the next-page chain serially, since each link is only
/// known once the previous page has been fetched. Per-URL failures become
/// error rows; only a store failure at the terminal write can fail a job.
pub struct JobExecutor {
    config: Arc<ScraperConfig>,
    strategy: Arc<dyn FetchStrategy>,
    hosts: Arc<HostRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl JobExecutor {
    pub fn new(
        config: ScraperConfig,
        strategy: Arc<dyn FetchStrategy>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            hosts: Arc::new(HostRegistry::new(config.clone())),
            config,
            strategy,
            metrics,
        }
    }

    /// Execute a job in the background, updating the stored record as it
    /// progresses and on the terminal transition.
    pub async fn run_job(&self, store: Arc<dyn JobStore>, mut job: Job) {
        info!("Starting scraping job {}", job.id);

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        if let Err(e) = store.update_job(&job).await {
            warn!("Failed to mark job {} running: {}", job.id, e);
        }

        let results = match job.request.site_url().map(str::to_string) {
            Some(seed) => self.run_site(&store, &mut job, &seed).await,
            None => self.run_batch(&store, &mut job).await,
        };

        job.results = results;
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.completed_at = Some(Utc::now());

        self.finish_job(&store, &mut job).await;
        info!(
            "Job {} completed with {} results",
            job.id,
            job.results.len()
        );
    }

    /// Persist the terminal record, retrying once. If the store stays down
    /// the job is marked failed on a best-effort basis.
    async fn finish_job(&self, store: &Arc<dyn JobStore>, job: &mut Job) {
        let Err(first) = store.update_job(job).await else {
            return;
        };
        error!("Failed to store results for job {}: {}", job.id, first);

        let Err(second) = store.update_job(job).await else {
            return;
        };
        error!(
            "Failed to store results for job {} again: {}",
            job.id, second
        );

        job.status = JobStatus::Failed;
        job.progress = 0;
        job.error = Some(format!("failed to persist results: {}", second));
        if let Err(e) = store.update_job(job).await {
            error!("Unable to mark job {} as failed: {}", job.id, e);
        }
    }

    /// Fan out concurrent fetches for an explicit batch of URLs.
    async fn run_batch(&self, store: &Arc<dyn JobStore>, job: &mut Job) -> Vec<ScrapedData> {
        let urls = job.request.urls.clone();
        info!(
            "Scraping {} URLs with {} max concurrent requests",
            urls.len(),
            self.config.max_concurrent
        );

        let deadline = Instant::now() + self.config.total_timeout;
        let mut tasks = JoinSet::new();
        for url in &urls {
            tasks.spawn(Self::scrape_one(
                url.clone(),
                self.config.clone(),
                self.strategy.clone(),
                self.hosts.clone(),
                self.metrics.clone(),
                deadline,
            ));
        }

        let total = urls.len().max(1);
        let mut results = Vec::with_capacity(urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(data) => results.push(data),
                Err(e) => {
                    error!("Scrape task for job {} failed: {}", job.id, e);
                    continue;
                }
            }
            self.record_progress(store, job, &results, total).await;
        }
        results
    }

    /// Follow the next-page chain from a seed URL, one fetch at a time.
    async fn run_site(
        &self,
        store: &Arc<dyn JobStore>,
        job: &mut Job,
        seed: &str,
    ) -> Vec<ScrapedData> {
        let max_pages = self.config.max_pages.max(1);
        info!("Scraping site {} (up to {} pages)", seed, max_pages);

        let deadline = Instant::now() + self.config.total_timeout;
        let mut results = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut worklist = VecDeque::from([seed.to_string()]);

        while let Some(url) = worklist.pop_front() {
            if visited.len() >= max_pages {
                break;
            }
            if !visited.insert(url.clone()) {
                continue;
            }

            let data = Self::scrape_one(
                url,
                self.config.clone(),
                self.strategy.clone(),
                self.hosts.clone(),
                self.metrics.clone(),
                deadline,
            )
            .await;

            if let Some(next) = data.next_url.as_deref() {
                if visited.len() < max_pages && !visited.contains(next) {
                    worklist.push_back(next.to_string());
                }
            }

            results.push(data);
            self.record_progress(store, job, &results, max_pages).await;
        }
        results
    }

    async fn record_progress(
        &self,
        store: &Arc<dyn JobStore>,
        job: &mut Job,
        results: &[ScrapedData],
        total: usize,
    ) {
        job.results = results.to_vec();
        job.progress = (results.len() * 100 / total.max(1)).min(99) as u8;
        if let Err(e) = store.update_job(job).await {
            warn!("Failed to update progress for job {}: {}", job.id, e);
        }
    }

    /// Run one URL through the full pipeline, racing the job deadline.
    /// Expired fetches are dropped at an await point, which releases their
    /// admission permits.
    async fn scrape_one(
        url: String,
        config: Arc<ScraperConfig>,
        strategy: Arc<dyn FetchStrategy>,
        hosts: Arc<HostRegistry>,
        metrics: Arc<MetricsCollector>,
        deadline: Instant,
    ) -> ScrapedData {
        if let Err(e) = validate_url(&url) {
            error!("Invalid URL {}: {}", url, e);
            return ScrapedData::from_error(&url, 0, &e);
        }

        let host = Url::parse(&url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or_default();
        let state = hosts.host_state(&host).await;

        let pipeline = async {
            match hosts.acquire(&state, &url).await {
                Ok(_permit) => {
                    fetch_with_retry(
                        strategy.as_ref(),
                        &state.breaker,
                        &url,
                        &host,
                        &config,
                        &metrics,
                    )
                    .await
                }
                Err(e) => ScrapedData::from_error(&url, 0, &e),
            }
        };

        match tokio::time::timeout_at(deadline, pipeline).await {
            Ok(data) => data,
            Err(_) => {
                warn!("Scrape of {} cancelled by job timeout", url);
                metrics.record_failure(&host, 0).await;
                let err = ScrapeError::Cancelled { url: url.clone() };
                ScrapedData::from_error(&url, 0, &err)
            }
        }
    }

    pub async fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot().await
    }

    pub async fn breaker_stats(&self) -> HashMap<String, BreakerStats> {
        self.hosts.breaker_stats().await
    }
}
