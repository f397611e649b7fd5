//! # apocrawl - Pharmacy Homepage Discovery and Crawling
//!
//! This crate finds the homepages of businesses that are known only by name
//! and address, and archives the visible text of every page on those
//! homepages' domains. It is built for long unattended runs over thousands of
//! entities: every step is persisted as it happens, so an interrupted run can
//! be resumed without refetching.
//!
//! ## Features
//!
//! - Entity loading from delimiter-separated tables in legacy encodings
//! - Homepage discovery through a pluggable search provider:
//!   - Featured "website" links and ranked organic results
//!   - Fuzzy ranking of result URLs against name and city
//!   - Content validation against the entity's address
//! - Bounded, resumable, same-domain depth-first crawling
//! - JSON persistence behind a swappable `Store` trait
//! - Per-entity failure containment with an append-only error log
//!
//! ## Example
//!
//! ```rust,no_run
//! use apocrawl::crawler::{CrawlerConfig, EntityLayout, HttpFetcher, JsonFileStore, RecursiveCrawler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CrawlerConfig::builder().max_pages(25).build();
//!     let fetcher = HttpFetcher::new(config.fetch.clone())?;
//!     let crawler = RecursiveCrawler::new(fetcher, JsonFileStore::new("output"));
//!
//!     let layout = EntityLayout::new("acme-pharmacy-springfield");
//!     let report = crawler
//!         .crawl("https://acme-pharmacy.com/", &layout, config.max_pages, false)
//!         .await?;
//!
//!     println!("Saved {} pages", report.pages_saved);
//!     Ok(())
//! }
//! ```

mod error;

pub mod crawler;
pub mod entity;
pub mod fuzzy;
pub mod orchestrator;
pub mod resolver;
pub mod search;
pub mod slug;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::crawler::{CrawlerConfig, HttpFetcher, JsonFileStore, RecursiveCrawler};
    pub use crate::entity::Entity;
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::orchestrator::{EntityCrawlOrchestrator, ErrorLog, Overview};
    pub use crate::resolver::{ContentValidator, HomepageResolver, MatchPolicy, ScoredHomepage};
    pub use crate::search::WebSearchProvider;
}
