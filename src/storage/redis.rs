use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::scraper::job::{Job, JobStatus};
use crate::storage::{JobStore, StoreError};

/// Records expire a day after their last write.
const JOB_TTL_SECS: u64 = 24 * 60 * 60;

/// Set tracking every job id ever saved.
const JOBS_SET_KEY: &str = "jobs:all";

/// Redis-backed job store.
///
/// Each job lives under `job:<id>` as a JSON blob with a 24h TTL, refreshed
/// on every write; `jobs:all` indexes the ids. Writes replace the whole
/// record, so concurrent updates are last-writer-wins and readers never see
/// a torn record.
pub struct RedisJobStore {
    conn: Arc<Mutex<MultiplexedConnection>>,
}

impl RedisJobStore {
    pub async fn new(
        addr: &str,
        password: Option<&str>,
        db: i64,
    ) -> Result<Self, StoreError> {
        let url = match password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{}@{}/{}", password, addr, db)
            }
            _ => format!("redis://{}/{}", addr, db),
        };

        let client = Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;

        // Fail fast at startup if the server is unreachable.
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn job_key(id: &str) -> String {
        format!("job:{}", id)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.lock().await;

        redis::cmd("SET")
            .arg(Self::job_key(&job.id))
            .arg(payload)
            .arg("EX")
            .arg(JOB_TTL_SECS)
            .query_async::<_, ()>(&mut *conn)
            .await?;

        redis::cmd("SADD")
            .arg(JOBS_SET_KEY)
            .arg(&job.id)
            .query_async::<_, ()>(&mut *conn)
            .await?;

        debug!("Stored job {}", job.id);
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job, StoreError> {
        let mut conn = self.conn.lock().await;

        let payload: Option<String> = redis::cmd("GET")
            .arg(Self::job_key(id))
            .query_async(&mut *conn)
            .await?;

        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        // A full-record write covers both create and update.
        self.save_job(job).await
    }

    async fn list_jobs(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.lock().await;
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(JOBS_SET_KEY)
            .query_async(&mut *conn)
            .await?;
        Ok(ids)
    }

    async fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let ids = self.list_jobs().await?;

        let mut jobs = Vec::new();
        for id in ids {
            // The record may have expired while still indexed.
            match self.get_job(&id).await {
                Ok(job) if job.status == status => jobs.push(job),
                Ok(_) | Err(StoreError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(jobs)
    }

    async fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;

        redis::cmd("SREM")
            .arg(JOBS_SET_KEY)
            .arg(id)
            .query_async::<_, ()>(&mut *conn)
            .await?;

        redis::cmd("DEL")
            .arg(Self::job_key(id))
            .query_async::<_, ()>(&mut *conn)
            .await?;

        debug!("Deleted job {}", id);
        Ok(())
    }
}
