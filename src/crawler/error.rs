//! Error types for the crawler module

use crate::crawler::storage::StorageError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error returned by a [`PageFetcher`](crate::crawler::PageFetcher)
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, refused connection, DNS failure or a broken body stream
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether a retry could succeed. Only transport failures qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transport(e) if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body())
    }
}

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Persistence error, fatal to the current entity
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl From<FetchError> for CrateError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(e) => CrateError::Http(e),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Storage(e) => e.into(),
            CrawlError::UrlParse(e) => CrateError::Crawl(format!("Invalid home URL: {}", e)),
        }
    }
}
