//! Asynchronous web scraping service.
//!
//! Clients submit a scraping job over HTTP (a batch of URLs, or a single seed
//! URL to paginate from), receive a job id immediately, and poll for status
//! and results. Fetches run through layered admission control (a global
//! concurrency cap plus optional per-host caps), a per-host circuit breaker,
//! and a bounded retry loop, using either a direct HTTP client or a headless
//! browser session. Job records are persisted in Redis (with an in-memory
//! fallback) so state survives restarts.

pub mod api;
pub mod cli;
pub mod errors;
pub mod scraper;
pub mod storage;
pub mod strategy;
pub mod utils;
