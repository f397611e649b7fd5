//! # Search Error Types Module
//!
//! This module defines error types specific to acquiring homepage candidates
//! from a search provider.
//!
//! ## Key Components
//!
//! - `SearchError`: Enum representing different types of search failures
//!
//! A failed search aborts resolution for the current entity only; the
//! orchestrator logs it and moves on to the next entity.

use thiserror::Error;

use crate::crawler::FetchError;
use crate::error::Error as CrateError;

/// Errors that can occur while querying a search provider
#[derive(Debug, Error)]
pub enum SearchError {
    /// The results page could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The search endpoint is not a valid URL
    #[error("Invalid search endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// Error occurred during result processing
    #[error("Result processing error: {0}")]
    ResultProcessing(String),
}

impl From<SearchError> for CrateError {
    fn from(err: SearchError) -> Self {
        CrateError::Search(err.to_string())
    }
}
