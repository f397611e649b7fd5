//! # Website Crawler Module
//!
//! This module crawls the websites of resolved homepages and stores the
//! flattened text of every same-domain page. It is the second stage of the
//! pipeline, after homepage resolution.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: page budget, resume flag and fetch settings
//! - `PageFetcher` / `HttpFetcher`: network access with timeouts and retries
//! - `scope_and_dedup`: link canonicalization and same-domain scoping
//! - `CrawlFrontier`: persisted, resumable seen-set per homepage domain
//! - `RecursiveCrawler`: the bounded depth-first traversal
//! - `Store` / `JsonFileStore`: persistence of all records
//!
//! ## Features
//!
//! - Fragment collapsing and media/account link filtering
//! - Crash-safe resumption: every frontier change is written through
//! - A single page budget shared across the whole traversal
//! - Dead links are pruned, never retried
//! - Graceful shutdown between fetches

mod config;
mod content_extraction;
mod error;
mod fetcher;
mod frontier;
pub mod mock_fetcher;
mod normalizer;
pub mod storage;
mod traversal;

// Re-export important types and functions
pub use config::{CrawlerConfig, CrawlerConfigBuilder, FetchConfig};
pub use content_extraction::{collapse_whitespace, extract_links, extract_text};
pub use error::{CrawlError, FetchError};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};
pub use frontier::{CrawlFrontier, FrontierRecord};
pub use normalizer::{scope_and_dedup, scope_and_dedup_with_known};
pub use storage::{EntityLayout, JsonFileStore, MemoryStore, StorageError, Store};
pub use traversal::{CrawlReport, RecursiveCrawler};

use serde::{Deserialize, Serialize};

/// The stored text of one visited page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL of the page
    pub url: String,

    /// Whitespace-normalized visible text of the page
    pub text: String,
}
