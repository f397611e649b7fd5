//! # Crawler Configuration Module
//!
//! This module provides configuration options for the crawl pipeline: the
//! HTTP fetch behavior shared by validation and traversal, and the crawl
//! bounds applied to every entity. It uses a builder pattern for flexible
//! configuration.
//!
//! ## Key Components
//!
//! - `FetchConfig`: user agent, timeouts, retry policy and TLS trust
//! - `CrawlerConfig`: page budget, resume flag and search/validation knobs
//! - `CrawlerConfigBuilder`: builder pattern implementation for easier configuration

use std::time::Duration;

use crate::resolver::MatchPolicy;

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent to use for requests
    pub user_agent: String,

    /// Total request timeout in milliseconds
    pub timeout_ms: u64,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Retries after a transport failure; HTTP error statuses are never retried
    pub max_retries: u32,

    /// Base delay between retries in milliseconds, doubled on each attempt
    pub retry_backoff_ms: u64,

    /// Accept invalid or self-signed TLS certificates
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("apocrawl/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_retries: 2,
            retry_backoff_ms: 500,
            accept_invalid_certs: true,
        }
    }
}

impl FetchConfig {
    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the connection timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Delay before retry number `attempt` (starting at 0)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Maximum number of page fetches per homepage traversal
    pub max_pages: usize,

    /// Continue from persisted state instead of starting over
    pub resume: bool,

    /// Number of search results to consider per entity
    pub search_qty: usize,

    /// Candidates scoring at or below this ratio are rejected
    pub min_score: u8,

    /// How many identifying fields a page must mention to validate a homepage
    pub match_policy: MatchPolicy,

    /// HTTP fetch settings
    pub fetch: FetchConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            resume: false,
            search_qty: 10,
            min_score: 50,
            match_policy: MatchPolicy::Any,
            fetch: FetchConfig::default(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the maximum number of pages to fetch per homepage
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set whether to resume from persisted state
    pub fn resume(mut self, resume: bool) -> Self {
        self.config.resume = resume;
        self
    }

    /// Set the number of search results to consider
    pub fn search_qty(mut self, search_qty: usize) -> Self {
        self.config.search_qty = search_qty;
        self
    }

    /// Set the minimum similarity score (exclusive)
    pub fn min_score(mut self, min_score: u8) -> Self {
        self.config.min_score = min_score;
        self
    }

    /// Set the homepage validation match policy
    pub fn match_policy(mut self, match_policy: MatchPolicy) -> Self {
        self.config.match_policy = match_policy;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.fetch.user_agent = user_agent.into();
        self
    }

    /// Set the request and connection timeouts in milliseconds
    pub fn timeouts_ms(mut self, timeout_ms: u64, connect_timeout_ms: u64) -> Self {
        self.config.fetch.timeout_ms = timeout_ms;
        self.config.fetch.connect_timeout_ms = connect_timeout_ms;
        self
    }

    /// Set the transport retry policy
    pub fn retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.config.fetch.max_retries = max_retries;
        self.config.fetch.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }
}
