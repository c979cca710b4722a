//! HTTP API: job submission, status polling, health, and metrics.
//!
//! Handlers are thin over the store and executor so integration tests can
//! build the router directly without starting the full binary.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::scraper::breaker::BreakerStats;
use crate::scraper::executor::JobExecutor;
use crate::scraper::job::{Job, ScrapeRequest};
use crate::storage::{JobStore, StoreError};
use crate::utils::metrics::MetricsSnapshot;

/// Shared state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub executor: Arc<JobExecutor>,
    pub enable_metrics: bool,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub circuit_breakers: HashMap<String, BreakerStats>,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    id: Option<String>,
}

/// Accept a scraping job and start executing it in the background.
pub async fn scrape_handler(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<(StatusCode, Json<ScrapeResponse>), (StatusCode, String)> {
    if request.site_url().is_none() && request.urls.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No URLs provided".to_string()));
    }

    let job = Job::new(request);
    state.store.save_job(&job).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save job: {}", e),
        )
    })?;

    info!("Accepted scraping job {}", job.id);

    let executor = state.executor.clone();
    let store = state.store.clone();
    let background = job.clone();
    tokio::spawn(async move {
        executor.run_job(store, background).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ScrapeResponse {
            job_id: job.id,
            status: "accepted".to_string(),
            message: "Scraping job created successfully".to_string(),
        }),
    ))
}

pub async fn status_handler(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<JobStatusResponse>, (StatusCode, String)> {
    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "Job ID required".to_string()))?;

    let job = state.store.get_job(&id).await.map_err(|e| match e {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "Job not found".to_string()),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to load job: {}", other),
        ),
    })?;

    let metrics = if state.enable_metrics {
        Some(state.executor.metrics_snapshot().await)
    } else {
        None
    };

    Ok(Json(JobStatusResponse { job, metrics }))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn metrics_handler(
    State(state): State<AppState>,
) -> Result<Json<MetricsResponse>, (StatusCode, String)> {
    if !state.enable_metrics {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "Metrics disabled".to_string()));
    }

    Ok(Json(MetricsResponse {
        metrics: state.executor.metrics_snapshot().await,
        circuit_breakers: state.executor.breaker_stats().await,
    }))
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler))
        .route("/scrape/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
