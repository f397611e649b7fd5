//! Error types for the apocrawl crate

use thiserror::Error;

/// Result type for apocrawl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for apocrawl operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error outside of the page store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Persistence error, fatal to the current entity
    #[error("Storage error: {0}")]
    Storage(String),

    /// Search provider error
    #[error("Search error: {0}")]
    Search(String),

    /// Entity table could not be read
    #[error("Input error: {0}")]
    Input(String),

    /// The pipeline panicked while processing an entity
    #[error("Unexpected failure: {0}")]
    Panic(String),
}
