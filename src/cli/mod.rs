pub mod config;

use anyhow::{bail, Result};
use clap::Parser;

use config::{parse_duration, ScraperConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Asynchronous web scraping service", long_about = None)]
pub struct Cli {
    /// Port for the HTTP API
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent requests
    #[arg(long)]
    pub concurrent: Option<usize>,

    /// Per-request timeout (e.g. "10s", "500ms")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Total timeout for a whole job (e.g. "30s")
    #[arg(long = "total-timeout")]
    pub total_timeout: Option<String>,

    /// Number of fetch attempts per URL
    #[arg(long)]
    pub retries: Option<u32>,

    /// Base delay between retries (e.g. "1s")
    #[arg(long = "retry-delay")]
    pub retry_delay: Option<String>,

    /// User-Agent header sent with direct HTTP fetches
    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    /// Use the headless browser strategy for JavaScript-rendered sites
    #[arg(long)]
    pub headless: bool,

    /// Maximum pages to follow in pagination mode
    #[arg(long = "max-pages")]
    pub max_pages: Option<usize>,

    /// Redis address (host:port); omit for in-memory job storage
    #[arg(long = "redis-addr")]
    pub redis_addr: Option<String>,

    /// Disable metrics collection
    #[arg(long = "no-metrics")]
    pub no_metrics: bool,
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

impl Cli {
    /// Layer the flag values over an environment-derived configuration.
    pub fn apply(&self, config: &mut ScraperConfig) -> Result<()> {
        if let Some(port) = self.port {
            config.api_port = port;
        }
        if let Some(concurrent) = self.concurrent {
            config.max_concurrent = concurrent;
        }
        if let Some(raw) = &self.timeout {
            config.request_timeout = parse_flag_duration("timeout", raw)?;
        }
        if let Some(raw) = &self.total_timeout {
            config.total_timeout = parse_flag_duration("total-timeout", raw)?;
        }
        if let Some(retries) = self.retries {
            config.retry_attempts = retries;
        }
        if let Some(raw) = &self.retry_delay {
            config.retry_base_delay = parse_flag_duration("retry-delay", raw)?;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if self.headless {
            config.use_headless = true;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(addr) = &self.redis_addr {
            config.redis_addr = Some(addr.clone());
        }
        if self.no_metrics {
            config.enable_metrics = false;
        }
        Ok(())
    }
}

fn parse_flag_duration(flag: &str, raw: &str) -> Result<std::time::Duration> {
    match parse_duration(raw) {
        Some(duration) => Ok(duration),
        None => bail!("invalid duration for --{}: {}", flag, raw),
    }
}
