use anyhow::{bail, Result};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Runtime configuration for the scraping service.
///
/// Values are loaded from `SCRAPER_*` environment variables and can be
/// overridden with command-line flags. The configuration is fixed at process
/// start; strategies and limiters are built from it once.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Maximum in-flight fetches across all hosts.
    pub max_concurrent: usize,

    /// Optional per-host concurrency caps. Hosts without an entry are only
    /// bounded by the global cap.
    pub per_host_limits: HashMap<String, usize>,

    /// Timeout for a single fetch attempt, including headless navigation.
    pub request_timeout: Duration,

    /// Timeout for a whole job, across all of its URLs.
    pub total_timeout: Duration,

    /// Number of fetch attempts per URL. 1 means no retries.
    pub retry_attempts: u32,

    /// Base delay between retries; attempt N sleeps N times this.
    pub retry_base_delay: Duration,

    /// Consecutive failures before a host's breaker opens.
    pub breaker_failure_threshold: u32,

    /// How long an open breaker waits before probing again.
    pub breaker_reset_timeout: Duration,

    /// Successful probes required to close a half-open breaker.
    pub breaker_halfopen_probes: u32,

    pub user_agent: String,

    /// Select the headless browser strategy instead of direct HTTP.
    pub use_headless: bool,

    /// Page bound for pagination-mode jobs.
    pub max_pages: usize,

    pub enable_metrics: bool,

    /// Port the HTTP API listens on.
    pub api_port: u16,

    /// Redis address (`host:port`). When unset, jobs are kept in memory.
    pub redis_addr: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: i64,

    /// WebDriver endpoint for the headless strategy.
    pub webdriver_url: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            per_host_limits: HashMap::new(),
            request_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            breaker_failure_threshold: 3,
            breaker_reset_timeout: Duration::from_secs(30),
            breaker_halfopen_probes: 1,
            user_agent: format!("scraper-service/{}", env!("CARGO_PKG_VERSION")),
            use_headless: false,
            max_pages: 10,
            enable_metrics: true,
            api_port: 8080,
            redis_addr: None,
            redis_password: None,
            redis_db: 0,
            webdriver_url: "http://localhost:4444".to_string(),
        }
    }
}

impl ScraperConfig {
    /// Load configuration from `SCRAPER_*` environment variables on top of
    /// the defaults. Unparseable values are skipped with a warning rather
    /// than aborting startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_usize("SCRAPER_MAX_CONCURRENT") {
            config.max_concurrent = v;
        }
        if let Some(v) = env_duration("SCRAPER_REQUEST_TIMEOUT") {
            config.request_timeout = v;
        }
        if let Some(v) = env_duration("SCRAPER_TOTAL_TIMEOUT") {
            config.total_timeout = v;
        }
        if let Ok(v) = env::var("SCRAPER_USER_AGENT") {
            if !v.is_empty() {
                config.user_agent = v;
            }
        }
        if let Some(v) = env_u32("SCRAPER_RETRY_ATTEMPTS") {
            config.retry_attempts = v;
        }
        if let Some(v) = env_duration("SCRAPER_RETRY_DELAY") {
            config.retry_base_delay = v;
        }
        if let Some(v) = env_u32("SCRAPER_CIRCUIT_BREAKER_THRESHOLD") {
            config.breaker_failure_threshold = v;
        }
        if let Some(v) = env_duration("SCRAPER_CIRCUIT_BREAKER_TIMEOUT") {
            config.breaker_reset_timeout = v;
        }
        if let Some(v) = env_u32("SCRAPER_CIRCUIT_BREAKER_HALFOPEN_PROBES") {
            config.breaker_halfopen_probes = v;
        }
        if let Ok(v) = env::var("SCRAPER_USE_HEADLESS") {
            config.use_headless = v == "true" || v == "1";
        }
        if let Some(v) = env_usize("SCRAPER_MAX_PAGES") {
            config.max_pages = v;
        }
        if let Ok(v) = env::var("SCRAPER_ENABLE_METRICS") {
            config.enable_metrics = v != "false" && v != "0";
        }
        if let Some(v) = env_u32("SCRAPER_API_PORT") {
            config.api_port = v as u16;
        }
        if let Ok(v) = env::var("SCRAPER_REDIS_ADDR") {
            if !v.is_empty() {
                config.redis_addr = Some(v);
            }
        }
        if let Ok(v) = env::var("SCRAPER_REDIS_PASSWORD") {
            if !v.is_empty() {
                config.redis_password = Some(v);
            }
        }
        if let Ok(v) = env::var("SCRAPER_REDIS_DB") {
            if let Ok(db) = v.parse() {
                config.redis_db = db;
            }
        }
        if let Ok(v) = env::var("SCRAPER_PER_HOST_LIMITS") {
            config.per_host_limits = parse_host_limits(&v);
        }
        if let Ok(v) = env::var("SCRAPER_WEBDRIVER_URL") {
            if !v.is_empty() {
                config.webdriver_url = v;
            }
        }

        config
    }

    /// Ensure the configuration is usable before building the service.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max_concurrent must be positive");
        }
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be positive");
        }
        if self.total_timeout.is_zero() {
            bail!("total_timeout must be positive");
        }
        if self.retry_attempts == 0 {
            bail!("retry_attempts must be at least 1");
        }
        if self.breaker_failure_threshold == 0 {
            bail!("circuit breaker threshold must be positive");
        }
        if self.breaker_halfopen_probes == 0 {
            bail!("circuit breaker half-open probe count must be positive");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be positive");
        }
        if let Some((host, _)) = self.per_host_limits.iter().find(|(_, &limit)| limit == 0) {
            bail!("per-host limit for {} must be positive", host);
        }
        Ok(())
    }
}

/// Parse a duration written as `500ms`, `10s`, or a plain number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.trim().parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = raw.strip_suffix('s') {
        return secs.trim().parse().ok().map(Duration::from_secs);
    }
    raw.parse().ok().map(Duration::from_secs)
}

/// Parse a `host=limit,host=limit` mapping, skipping malformed entries.
fn parse_host_limits(raw: &str) -> HashMap<String, usize> {
    let mut limits = HashMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((host, limit)) => match limit.trim().parse::<usize>() {
                Ok(limit) if !host.trim().is_empty() => {
                    limits.insert(host.trim().to_string(), limit);
                }
                _ => warn!("Skipping malformed per-host limit entry: {}", entry),
            },
            None => warn!("Skipping malformed per-host limit entry: {}", entry),
        }
    }
    limits
}

fn env_duration(key: &str) -> Option<Duration> {
    env::var(key).ok().and_then(|v| parse_duration(&v))
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
