use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Scraping statistics collector.
///
/// Plain counters are atomics so the hot path never blocks; derived
/// aggregates (response times, status codes, per-host rollups) sit behind
/// their own mutex and are folded into a snapshot on demand.
pub struct MetricsCollector {
    started: Instant,
    start_time: DateTime<Utc>,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retry_attempts: AtomicU64,
    total_bytes: AtomicU64,
    inner: Mutex<Aggregates>,
}

#[derive(Default)]
struct Aggregates {
    min_response_ms: Option<u64>,
    max_response_ms: u64,
    total_response_ms: u64,
    response_samples: u64,
    status_codes: HashMap<u16, u64>,
    hosts: HashMap<String, HostAggregate>,
}

#[derive(Default)]
struct HostAggregate {
    requests: u64,
    successes: u64,
    failures: u64,
    total_bytes: u64,
    total_response_ms: u64,
    response_samples: u64,
}

/// Serializable metrics document served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retry_attempts: u64,
    pub total_bytes: u64,
    pub success_rate: f64,
    pub requests_per_second: f64,
    pub start_time: DateTime<Utc>,
    pub response_times: ResponseTimes,
    /// Status-code distribution, keyed by the code as a string so the
    /// document stays a plain JSON object.
    pub status_codes: HashMap<String, u64>,
    pub hosts: HashMap<String, HostStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseTimes {
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_bytes: u64,
    pub avg_response_ms: u64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            start_time: Utc::now(),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            inner: Mutex::new(Aggregates::default()),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_success(
        &self,
        host: &str,
        status: u16,
        bytes: u64,
        response_time: Duration,
    ) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);

        let elapsed_ms = response_time.as_millis() as u64;
        let mut inner = self.inner.lock().await;

        *inner.status_codes.entry(status).or_default() += 1;

        inner.min_response_ms = Some(match inner.min_response_ms {
            Some(min) => min.min(elapsed_ms),
            None => elapsed_ms,
        });
        inner.max_response_ms = inner.max_response_ms.max(elapsed_ms);
        inner.total_response_ms += elapsed_ms;
        inner.response_samples += 1;

        let host_stats = inner.hosts.entry(host.to_string()).or_default();
        host_stats.requests += 1;
        host_stats.successes += 1;
        host_stats.total_bytes += bytes;
        host_stats.total_response_ms += elapsed_ms;
        host_stats.response_samples += 1;
    }

    pub async fn record_failure(&self, host: &str, status: u16) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock().await;
        if status > 0 {
            *inner.status_codes.entry(status).or_default() += 1;
        }

        let host_stats = inner.hosts.entry(host.to_string()).or_default();
        host_stats.requests += 1;
        host_stats.failures += 1;
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful_requests = self.successful_requests.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();

        let success_rate = if total_requests == 0 {
            0.0
        } else {
            successful_requests as f64 / total_requests as f64 * 100.0
        };
        let requests_per_second = if elapsed > 0.0 {
            total_requests as f64 / elapsed
        } else {
            0.0
        };

        let inner = self.inner.lock().await;
        let avg_ms = if inner.response_samples == 0 {
            0
        } else {
            inner.total_response_ms / inner.response_samples
        };

        let hosts = inner
            .hosts
            .iter()
            .map(|(host, agg)| {
                let avg_response_ms = if agg.response_samples == 0 {
                    0
                } else {
                    agg.total_response_ms / agg.response_samples
                };
                (
                    host.clone(),
                    HostStats {
                        requests: agg.requests,
                        successes: agg.successes,
                        failures: agg.failures,
                        total_bytes: agg.total_bytes,
                        avg_response_ms,
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            total_requests,
            successful_requests,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            success_rate,
            requests_per_second,
            start_time: self.start_time,
            response_times: ResponseTimes {
                min_ms: inner.min_response_ms.unwrap_or(0),
                max_ms: inner.max_response_ms,
                avg_ms,
            },
            status_codes: inner
                .status_codes
                .iter()
                .map(|(code, count)| (code.to_string(), *count))
                .collect(),
            hosts,
        }
    }
}
