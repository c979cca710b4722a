use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
    last_failure: Option<DateTime<Utc>>,
    last_transition: Instant,
    last_state_change: DateTime<Utc>,
}

/// Per-host circuit breaker.
///
/// Closed admits everything; `failure_threshold` consecutive failures open
/// the circuit. An open breaker rejects until `reset_timeout` has elapsed
/// since the last transition, at which point the next admission check moves
/// it to half-open and lets `half_open_limit` probes through. Probe success
/// closes the circuit, any probe failure reopens it. Every transition
/// resets both working counters; the totals only ever grow.
pub struct CircuitBreaker {
    host: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_limit: u32,
    inner: Mutex<BreakerInner>,
}

/// Point-in-time view of one breaker, reported in per-host statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub failure_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
}

impl CircuitBreaker {
    pub fn new(
        host: &str,
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_limit: u32,
    ) -> Self {
        Self {
            host: host.to_string(),
            failure_threshold,
            reset_timeout,
            half_open_limit,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                total_requests: 0,
                total_failures: 0,
                total_successes: 0,
                last_failure: None,
                last_transition: Instant::now(),
                last_state_change: Utc::now(),
            }),
        }
    }

    /// Run a fetch under breaker protection.
    ///
    /// Rejection happens before the future is polled, so an open breaker
    /// never costs a network round trip.
    pub async fn execute<T, F>(&self, fut: F) -> Result<T, ScrapeError>
    where
        F: Future<Output = Result<T, ScrapeError>>,
    {
        self.admit().await?;

        {
            let mut inner = self.inner.lock().await;
            inner.total_requests += 1;
        }

        match fut.await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure().await;
                Err(err)
            }
        }
    }

    /// Check whether a request may proceed right now.
    ///
    /// This is also where the lazy open-to-half-open transition happens:
    /// nothing moves the breaker out of open until someone asks.
    pub async fn admit(&self) -> Result<(), ScrapeError> {
        let mut inner = self.inner.lock().await;

        if inner.state == BreakerState::Open
            && inner.last_transition.elapsed() >= self.reset_timeout
        {
            Self::transition(&mut inner, BreakerState::HalfOpen);
            debug!("Circuit breaker for {} entering half-open", self.host);
        }

        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => Err(ScrapeError::BreakerOpen {
                host: self.host.clone(),
            }),
            BreakerState::HalfOpen if inner.success_count < self.half_open_limit => Ok(()),
            BreakerState::HalfOpen => Err(ScrapeError::BreakerOpen {
                host: self.host.clone(),
            }),
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.total_successes += 1;
        inner.success_count += 1;

        if inner.state == BreakerState::HalfOpen && inner.success_count >= self.half_open_limit {
            Self::transition(&mut inner, BreakerState::Closed);
            info!("Circuit breaker for {} closed", self.host);
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.total_failures += 1;
        inner.failure_count += 1;
        inner.last_failure = Some(Utc::now());

        match inner.state {
            BreakerState::Closed if inner.failure_count >= self.failure_threshold => {
                Self::transition(&mut inner, BreakerState::Open);
                warn!(
                    "Circuit breaker for {} opened after {} consecutive failures",
                    self.host, self.failure_threshold
                );
            }
            BreakerState::HalfOpen => {
                Self::transition(&mut inner, BreakerState::Open);
                warn!("Circuit breaker for {} reopened by probe failure", self.host);
            }
            _ => {}
        }
    }

    fn transition(inner: &mut BreakerInner, next: BreakerState) {
        if inner.state != next {
            inner.state = next;
            inner.last_transition = Instant::now();
            inner.last_state_change = Utc::now();
            inner.failure_count = 0;
            inner.success_count = 0;
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    pub async fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().await;
        let failure_rate = if inner.total_requests == 0 {
            0.0
        } else {
            inner.total_failures as f64 / inner.total_requests as f64 * 100.0
        };

        BreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            failure_rate,
            last_failure: inner.last_failure,
            last_state_change: inner.last_state_change,
        }
    }
}
