//! # Homepage Search Module
//!
//! This module asks a search engine for candidate homepages of an entity. It
//! forms the "discovery" half of homepage resolution; the resolver scores and
//! validates whatever the provider returns.
//!
//! ## Key Components
//!
//! - `SearchProvider`: the seam between resolution and any concrete engine
//! - `SearchSuggestions`: an optional featured website link plus ranked results
//! - `WebSearchProvider`: scrapes a search engine's HTML results page
//!
//! ## Search Process
//!
//! 1. Build a query from name, street, postal code and city
//! 2. Fetch the results page through the shared `PageFetcher`
//! 3. Pick the featured "Website" button, if any
//! 4. Collect the links behind result headings, unwrapping redirect links

mod error;
mod provider;

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::entity::Entity;

pub use error::SearchError;
pub use provider::{DEFAULT_SEARCH_ENDPOINT, WebSearchProvider, parse_results, search_query};

/// Candidates returned for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSuggestions {
    /// The engine's own "website" link for the entity, if it showed one
    pub featured_url: Option<String>,

    /// Organic result URLs in ranking order
    pub results: Vec<String>,
}

/// Source of homepage candidates
pub trait SearchProvider: Send + Sync {
    /// Return up to `max_candidates` result URLs plus an optional featured URL
    fn suggest(
        &self,
        entity: &Entity,
        max_candidates: usize,
    ) -> impl Future<Output = Result<SearchSuggestions, SearchError>> + Send;
}
