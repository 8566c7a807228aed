//! Ingestion scrapers for news articles and fact-checks.
//!
//! Both scrapers follow the same two-phase pattern:
//!
//! 1. **Indexing**: discover what to fetch (feed entries, list pages)
//! 2. **Fetching**: download each page, parse it and insert the result
//!
//! # Sources
//!
//! | Module | Source | Method | Table |
//! |--------|--------|--------|-------|
//! | [`news`] | RSS / Atom feeds | feed XML + article HTML | `articles` |
//! | [`politifact`] | PolitiFact list pages | HTML scraping | `fact_checks` |
//!
//! Failures are handled per item: a feed, page or article that cannot be
//! fetched or parsed is logged and skipped, and nothing is written for it.
//! Requests are issued one at a time with a fixed delay in between.

pub mod news;
pub mod politifact;

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed feed: {0}")]
    Feed(String),
}

/// Build the HTTP client shared by a scraping run.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, ScrapeError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

/// Download a page body, treating any non-success status as an error.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.text().await?;
    debug!(bytes = body.len(), "Downloaded page");
    Ok(body)
}
