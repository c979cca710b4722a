use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

use crate::cli::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::scraper::breaker::{BreakerStats, CircuitBreaker};

/// Per-host fault isolation and admission state, created lazily on the
/// first request to a host and kept for the life of the process.
pub struct HostState {
    pub breaker: CircuitBreaker,
    /// Per-host concurrency cap; `None` means only the global cap applies.
    pub limiter: Option<Arc<Semaphore>>,
}

/// Registry of host state plus the global admission semaphore.
///
/// Admission layers two semaphores around every fetch: the global one
/// first, then the host's own if one is configured. Permits are owned, so
/// both are released in reverse order on every exit path, including
/// cancellation mid-acquire.
pub struct HostRegistry {
    global: Arc<Semaphore>,
    hosts: RwLock<HashMap<String, Arc<HostState>>>,
    config: Arc<ScraperConfig>,
}

/// RAII admission slot. Field order matters: the host permit is declared
/// first so it drops before the global one.
pub struct AdmissionPermit {
    _host: Option<OwnedSemaphorePermit>,
    _global: OwnedSemaphorePermit,
}

impl HostRegistry {
    pub fn new(config: Arc<ScraperConfig>) -> Self {
        Self {
            global: Arc::new(Semaphore::new(config.max_concurrent)),
            hosts: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Fetch or lazily create the state for a host.
    pub async fn host_state(&self, host: &str) -> Arc<HostState> {
        {
            let hosts = self.hosts.read().await;
            if let Some(state) = hosts.get(host) {
                return state.clone();
            }
        }

        let mut hosts = self.hosts.write().await;
        hosts
            .entry(host.to_string())
            .or_insert_with(|| {
                let limiter = self
                    .config
                    .per_host_limits
                    .get(host)
                    .map(|&limit| Arc::new(Semaphore::new(limit)));
                Arc::new(HostState {
                    breaker: CircuitBreaker::new(
                        host,
                        self.config.breaker_failure_threshold,
                        self.config.breaker_reset_timeout,
                        self.config.breaker_halfopen_probes,
                    ),
                    limiter,
                })
            })
            .clone()
    }

    /// Block until both admission slots are available: global, then host.
    pub async fn acquire(
        &self,
        state: &HostState,
        url: &str,
    ) -> Result<AdmissionPermit, ScrapeError> {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScrapeError::Cancelled {
                url: url.to_string(),
            })?;

        let host = match &state.limiter {
            Some(limiter) => Some(limiter.clone().acquire_owned().await.map_err(|_| {
                ScrapeError::Cancelled {
                    url: url.to_string(),
                }
            })?),
            None => None,
        };

        Ok(AdmissionPermit {
            _host: host,
            _global: global,
        })
    }

    /// Consistent snapshot of every known host's breaker.
    pub async fn breaker_stats(&self) -> HashMap<String, BreakerStats> {
        let hosts = self.hosts.read().await;
        let mut stats = HashMap::with_capacity(hosts.len());
        for (host, state) in hosts.iter() {
            stats.insert(host.clone(), state.breaker.stats().await);
        }
        stats
    }

    pub fn global_available(&self) -> usize {
        self.global.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry(max_concurrent: usize, per_host: Option<(&str, usize)>) -> HostRegistry {
        let mut config = ScraperConfig::default();
        config.max_concurrent = max_concurrent;
        if let Some((host, limit)) = per_host {
            config.per_host_limits.insert(host.to_string(), limit);
        }
        HostRegistry::new(Arc::new(config))
    }

    #[tokio::test]
    async fn test_host_state_is_created_once() {
        let registry = registry(2, None);
        let first = registry.host_state("example.com").await;
        let second = registry.host_state("example.com").await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_per_host_limit_only_where_configured() {
        let registry = registry(4, Some(("example.com", 1)));

        let limited = registry.host_state("example.com").await;
        assert!(limited.limiter.is_some());

        let unlimited = registry.host_state("other.com").await;
        assert!(unlimited.limiter.is_none());
    }

    #[tokio::test]
    async fn test_permits_release_on_drop() {
        let registry = registry(1, Some(("example.com", 1)));
        let state = registry.host_state("example.com").await;

        {
            let _permit = registry.acquire(&state, "http://example.com").await.unwrap();
            assert_eq!(registry.global_available(), 0);
        }
        assert_eq!(registry.global_available(), 1);

        // A second acquire succeeds promptly once the first is dropped.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            registry.acquire(&state, "http://example.com"),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_global_cap_blocks_across_hosts() {
        let registry = registry(1, None);
        let a = registry.host_state("a.com").await;
        let b = registry.host_state("b.com").await;

        let held = registry.acquire(&a, "http://a.com").await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            registry.acquire(&b, "http://b.com"),
        )
        .await;
        assert!(blocked.is_err(), "second acquire should block on global cap");

        drop(held);
        let unblocked = tokio::time::timeout(
            Duration::from_millis(100),
            registry.acquire(&b, "http://b.com"),
        )
        .await;
        assert!(unblocked.is_ok());
    }
}
