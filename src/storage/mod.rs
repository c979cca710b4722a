pub mod memory;
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::cli::config::ScraperConfig;
use crate::scraper::job::{Job, JobStatus};

pub use self::memory::MemoryJobStore;
pub use self::redis::RedisJobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {id}")]
    NotFound { id: String },

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable job persistence.
///
/// Updates are full-record replaces with last-writer-wins semantics; a
/// record read is always internally consistent even while the executor is
/// writing. Records may expire out from under the secondary index, so scans
/// tolerate missing ids.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    async fn get_job(&self, id: &str) -> Result<Job, StoreError>;

    async fn update_job(&self, job: &Job) -> Result<(), StoreError>;

    async fn list_jobs(&self) -> Result<Vec<String>, StoreError>;

    async fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    async fn delete_job(&self, id: &str) -> Result<(), StoreError>;
}

/// Select the store implementation from configuration: Redis when an
/// address is present, the in-memory fallback otherwise.
pub async fn build_store(config: &ScraperConfig) -> Result<Arc<dyn JobStore>> {
    match &config.redis_addr {
        Some(addr) => {
            let store =
                RedisJobStore::new(addr, config.redis_password.as_deref(), config.redis_db).await?;
            info!("Using Redis job storage at {}", addr);
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory job storage (not persistent)");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}
