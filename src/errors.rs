use thiserror::Error;
use url::Url;

/// Errors raised while fetching a single URL.
///
/// The variant is what drives retry classification: transports and a fixed
/// set of HTTP status codes are retryable, everything else fails the URL on
/// the spot. Breaker rejections carry the host so callers can abort the
/// retry loop for that URL.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("circuit breaker open for {host}")]
    BreakerOpen { host: String },

    #[error("scrape cancelled for {url}")]
    Cancelled { url: String },
}

impl ScrapeError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether another attempt at the same URL may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => {
                matches!(*status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            Self::InvalidUrl { .. } | Self::BreakerOpen { .. } | Self::Cancelled { .. } => false,
        }
    }

    /// HTTP status carried by the error, 0 for transport-level failures.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            _ => 0,
        }
    }
}

/// Validate that a URL is non-empty, parses, and is http(s) with a host.
pub fn validate_url(url: &str) -> Result<(), ScrapeError> {
    if url.is_empty() {
        return Err(ScrapeError::InvalidUrl {
            url: url.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ScrapeError::InvalidUrl {
            url: url.to_string(),
            reason: format!("scheme must be http or https, got {}", parsed.scheme()),
        });
    }

    if parsed.host_str().is_none() {
        return Err(ScrapeError::InvalidUrl {
            url: url.to_string(),
            reason: "URL must have a host".to_string(),
        });
    }

    Ok(())
}
