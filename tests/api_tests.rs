mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use scraper_service::api::{create_router, AppState};
use scraper_service::cli::config::ScraperConfig;
use scraper_service::scraper::executor::JobExecutor;
use scraper_service::storage::MemoryJobStore;
use scraper_service::utils::metrics::MetricsCollector;

use support::{page, page_with_next, ScriptedStrategy};

fn test_config() -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.retry_base_delay = Duration::from_millis(10);
    config.total_timeout = Duration::from_secs(5);
    config
}

fn build_app(config: ScraperConfig, strategy: ScriptedStrategy) -> Router {
    let enable_metrics = config.enable_metrics;
    let executor = Arc::new(JobExecutor::new(
        config,
        Arc::new(strategy),
        Arc::new(MetricsCollector::new()),
    ));
    create_router(AppState {
        store: Arc::new(MemoryJobStore::new()),
        executor,
        enable_metrics,
    })
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Poll the status endpoint until the job reaches a terminal state.
async fn poll_until_done(app: &Router, job_id: &str) -> Value {
    for _ in 0..250 {
        let (status, body) = get(app, &format!("/scrape/status?id={}", job_id)).await;
        assert_eq!(status, StatusCode::OK);
        match body["job"]["status"].as_str() {
            Some("completed") | Some("failed") => return body,
            _ => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("job {} never reached a terminal state", job_id);
}

#[tokio::test]
async fn test_submit_batch_and_poll_to_completion() {
    let app = build_app(test_config(), ScriptedStrategy::new());

    let (status, body) = post_json(
        &app,
        "/scrape",
        json!({"urls": ["http://a.test/one", "http://b.test/two"]}),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    let job_id = body["job_id"].as_str().expect("job_id present").to_string();

    // The job record exists immediately, in a pre-terminal state at first.
    let (status, first_poll) = get(&app, &format!("/scrape/status?id={}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    let first_status = first_poll["job"]["status"].as_str().unwrap().to_string();
    assert!(
        ["pending", "running", "completed"].contains(&first_status.as_str()),
        "unexpected status {}",
        first_status
    );

    let done = poll_until_done(&app, &job_id).await;
    let job = &done["job"];
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert!(job["completed_at"].is_string());

    let results = job["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result["status"], 200);
        assert!(!result["title"].as_str().unwrap().is_empty());
        assert!(result.get("error").is_none());
    }
}

#[tokio::test]
async fn test_submit_site_url_paginates() {
    let strategy = ScriptedStrategy::new();
    strategy
        .script(
            "http://site.test/page/1",
            vec![Ok(page_with_next("Page 1", "http://site.test/page/2"))],
        )
        .await;
    strategy
        .script("http://site.test/page/2", vec![Ok(page("Page 2"))])
        .await;

    let mut config = test_config();
    config.max_pages = 5;
    let app = build_app(config, strategy);

    let (status, body) = post_json(
        &app,
        "/scrape",
        json!({"site_url": "http://site.test/page/1"}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let done = poll_until_done(&app, body["job_id"].as_str().unwrap()).await;
    let results = done["job"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["url"], "http://site.test/page/1");
    assert_eq!(results[1]["url"], "http://site.test/page/2");
}

#[tokio::test]
async fn test_submit_rejects_empty_request() {
    let app = build_app(test_config(), ScriptedStrategy::new());

    let (status, _) = post_json(&app, "/scrape", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&app, "/scrape", json!({"urls": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_rejects_invalid_json() {
    let app = build_app(test_config(), ScriptedStrategy::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scrape")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_requires_id() {
    let app = build_app(test_config(), ScriptedStrategy::new());
    let (status, _) = get(&app, "/scrape/status").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_unknown_job_is_404() {
    let app = build_app(test_config(), ScriptedStrategy::new());
    let (status, _) = get(&app, "/scrape/status?id=does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app(test_config(), ScriptedStrategy::new());
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint_reports_totals() {
    let app = build_app(test_config(), ScriptedStrategy::new());

    let (_, body) = post_json(&app, "/scrape", json!({"urls": ["http://a.test/"]})).await;
    poll_until_done(&app, body["job_id"].as_str().unwrap()).await;

    let (status, metrics) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["total_requests"], 1);
    assert_eq!(metrics["successful_requests"], 1);
    assert!(metrics["circuit_breakers"]["a.test"].is_object());
}

#[tokio::test]
async fn test_metrics_endpoint_disabled() {
    let mut config = test_config();
    config.enable_metrics = false;
    let app = build_app(config, ScriptedStrategy::new());

    let (status, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status_attaches_metrics_when_enabled() {
    let app = build_app(test_config(), ScriptedStrategy::new());

    let (_, body) = post_json(&app, "/scrape", json!({"urls": ["http://a.test/"]})).await;
    let done = poll_until_done(&app, body["job_id"].as_str().unwrap()).await;

    assert!(done["metrics"].is_object());
    assert!(done["metrics"]["total_requests"].is_u64());
}
