use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::scraper::job::{Job, JobStatus};
use crate::storage::{JobStore, StoreError};

/// In-memory job store, used when no Redis address is configured. Jobs are
/// lost on restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job, StoreError> {
        let jobs = self.jobs.read().await;
        jobs.get(id).cloned().ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        self.save_job(job).await
    }

    async fn list_jobs(&self) -> Result<Vec<String>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.keys().cloned().collect())
    }

    async fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect())
    }

    async fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::job::ScrapeRequest;

    fn sample_job() -> Job {
        Job::new(ScrapeRequest {
            urls: vec!["https://example.com".to_string()],
            site_url: None,
        })
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips() {
        let store = MemoryJobStore::new();
        let job = sample_job();

        store.save_job(&job).await.unwrap();
        let loaded = store.get_job(&job.id).await.unwrap();

        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.status, job.status);
        assert_eq!(loaded.request.urls, job.request.urls);
        assert_eq!(loaded.created_at, job.created_at);
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        assert!(matches!(
            store.get_job("missing").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_is_last_writer_wins() {
        let store = MemoryJobStore::new();
        let mut job = sample_job();
        store.save_job(&job).await.unwrap();

        job.status = JobStatus::Running;
        store.update_job(&job).await.unwrap();
        job.status = JobStatus::Completed;
        job.progress = 100;
        store.update_job(&job).await.unwrap();

        let loaded = store.get_job(&job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.progress, 100);
    }

    #[tokio::test]
    async fn test_list_and_filter_by_status() {
        let store = MemoryJobStore::new();
        let pending = sample_job();
        let mut running = sample_job();
        running.status = JobStatus::Running;

        store.save_job(&pending).await.unwrap();
        store.save_job(&running).await.unwrap();

        let ids = store.list_jobs().await.unwrap();
        assert_eq!(ids.len(), 2);

        let found = store.get_jobs_by_status(JobStatus::Running).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, running.id);
    }

    #[tokio::test]
    async fn test_delete_job() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        store.save_job(&job).await.unwrap();
        store.delete_job(&job.id).await.unwrap();
        assert!(store.get_job(&job.id).await.is_err());

        // Deleting an unknown id is not an error.
        store.delete_job("missing").await.unwrap();
    }
}
