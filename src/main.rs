use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scraper_service::api::{self, AppState};
use scraper_service::cli;
use scraper_service::cli::config::ScraperConfig;
use scraper_service::scraper::executor::JobExecutor;
use scraper_service::storage;
use scraper_service::strategy;
use scraper_service::utils::metrics::MetricsCollector;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting scraper service v{}", env!("CARGO_PKG_VERSION"));

    // Environment configuration with command-line overrides
    let args = cli::parse_args();
    let mut config = ScraperConfig::from_env();
    args.apply(&mut config)?;
    config.validate()?;
    info!("Configuration: {:?}", config);

    let store = storage::build_store(&config).await?;
    let metrics = Arc::new(MetricsCollector::new());
    let fetch_strategy = strategy::build_strategy(&config)?;
    let executor = Arc::new(JobExecutor::new(
        config.clone(),
        fetch_strategy,
        metrics,
    ));

    let state = AppState {
        store,
        executor,
        enable_metrics: config.enable_metrics,
    };

    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, api::create_router(state)).await?;

    Ok(())
}
