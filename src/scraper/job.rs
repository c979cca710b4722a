use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ScrapeError;
use crate::strategy::FetchedPage;

/// What a job should scrape: an explicit batch of URLs, or a single seed
/// URL whose pagination links are followed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

impl ScrapeRequest {
    /// The seed URL for pagination mode, if this is a pagination request.
    pub fn site_url(&self) -> Option<&str> {
        self.site_url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-URL outcome within a job.
///
/// Exactly one of `error` or a successful `status`/`title` pair is set in a
/// finished row. `next_url` is only populated by the headless strategy when
/// the page carries a pagination link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedData {
    pub url: String,
    pub title: String,
    pub status: u16,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub scraped: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
}

impl ScrapedData {
    pub fn from_page(url: &str, page: &FetchedPage) -> Self {
        Self {
            url: url.to_string(),
            title: page.title.clone(),
            status: page.status,
            size: page.body.len(),
            error: None,
            scraped: Utc::now(),
            next_url: page.next_url.clone().filter(|next| !next.is_empty()),
        }
    }

    pub fn from_error(url: &str, status: u16, err: &ScrapeError) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            status,
            size: 0,
            error: Some(err.to_string()),
            scraped: Utc::now(),
            next_url: None,
        }
    }
}

/// An asynchronous scraping job and its accumulated state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub request: ScrapeRequest,
    #[serde(default)]
    pub results: Vec<ScrapedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// 0-100; reaches 100 only on successful completion.
    pub progress: u8,
}

impl Job {
    pub fn new(request: ScrapeRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            request,
            results: Vec::new(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0,
        }
    }
}
