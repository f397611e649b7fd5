//! # Homepage Resolution Module
//!
//! Turns an [`Entity`] into a list of scored homepage candidates. Candidates
//! come from a [`SearchProvider`]; each one is ranked by fuzzy similarity
//! between the entity's name and city and the URL, then confirmed by a
//! [`HomepageValidator`] that looks for the entity's details on the page.
//!
//! ## Scoring
//!
//! - The provider's featured website link scores 100 and skips ranking
//! - Every other result scores `fuzzy::ratio(name + city, url)`
//! - Results at or below `min_score` are rejected before any validation fetch
//!
//! Output keeps discovery order: featured link first, then results in the
//! order the provider ranked them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument};

use crate::crawler::{FetchedPage, PageFetcher, extract_text};
use crate::entity::Entity;
use crate::fuzzy::{CLOSE_MATCH_CUTOFF, has_close_match, ratio};
use crate::search::{SearchError, SearchProvider};

/// Score reserved for the provider's featured website link
pub const FEATURED_SCORE: u8 = 100;

/// Default exclusive lower bound for ranked candidates
pub const DEFAULT_MIN_SCORE: u8 = 50;

/// A validated homepage candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredHomepage {
    pub url: String,

    /// Similarity score in `(min_score, 100]`
    pub score: u8,

    /// Same-domain pages discovered by the crawler, filled in after traversal
    #[serde(default)]
    pub subpages: Vec<String>,
}

impl ScoredHomepage {
    pub fn new(url: impl Into<String>, score: u8) -> Self {
        Self {
            url: url.into(),
            score,
            subpages: Vec::new(),
        }
    }
}

/// How many identifying fields must appear on a page for it to count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// At least one field
    #[default]
    Any,
    /// More than half of the fields
    Majority,
    /// Every field
    All,
}

impl MatchPolicy {
    /// Whether `matched` out of `total` fields satisfies the policy
    pub fn is_satisfied(self, matched: usize, total: usize) -> bool {
        match self {
            MatchPolicy::Any => matched > 0,
            MatchPolicy::Majority => matched * 2 > total,
            MatchPolicy::All => total > 0 && matched == total,
        }
    }
}

/// Decides whether a candidate URL really is the entity's homepage
pub trait HomepageValidator: Send + Sync {
    fn validate(&self, url: &str, entity: &Entity) -> impl Future<Output = bool> + Send;
}

/// Validates a candidate by fuzzy-matching the entity's details against the
/// page's visible text
#[derive(Debug, Clone)]
pub struct ContentValidator<F> {
    fetcher: F,
    policy: MatchPolicy,
}

impl<F: PageFetcher> ContentValidator<F> {
    pub fn new(fetcher: F, policy: MatchPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Number of the entity's identifying fields with a close match in `text`
    pub fn matching_fields(entity: &Entity, text: &str) -> usize {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        entity
            .identifying_fields()
            .into_iter()
            .filter(|field| has_close_match(field, tokens.iter().copied(), CLOSE_MATCH_CUTOFF))
            .count()
    }
}

impl<F: PageFetcher> HomepageValidator for ContentValidator<F> {
    async fn validate(&self, url: &str, entity: &Entity) -> bool {
        let page = match self
            .fetcher
            .fetch(url)
            .await
            .and_then(FetchedPage::into_success)
        {
            Ok(page) => page,
            Err(e) => {
                debug!("Rejecting {}: {}", url, e);
                return false;
            }
        };

        let text = extract_text(&page.body);
        let matched = Self::matching_fields(entity, &text);
        let total = entity.identifying_fields().len();
        debug!("{} matched {}/{} fields", url, matched, total);

        self.policy.is_satisfied(matched, total)
    }
}

/// Combines a search provider and a validator into scored homepages
#[derive(Debug, Clone)]
pub struct HomepageResolver<P, V> {
    provider: P,
    validator: V,
    min_score: u8,
    shutdown: Arc<AtomicBool>,
}

impl<P, V> HomepageResolver<P, V> {
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }
}

impl<P: SearchProvider, V: HomepageValidator> HomepageResolver<P, V> {
    pub fn new(provider: P, validator: V) -> Self {
        Self {
            provider,
            validator,
            min_score: DEFAULT_MIN_SCORE,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reject ranked candidates scoring at or below `min_score`
    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }

    /// Stop before the next search or validation fetch once `flag` is set
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Whether shutdown has been requested
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Find the entity's validated homepages in discovery order
    ///
    /// After a shutdown request the candidates validated so far are returned
    /// and no further fetch is made.
    #[instrument(skip(self, entity), fields(entity = %entity.slug()))]
    pub async fn resolve(
        &self,
        entity: &Entity,
        max_candidates: usize,
    ) -> Result<Vec<ScoredHomepage>, SearchError> {
        let mut accepted: Vec<ScoredHomepage> = Vec::new();
        if self.shutdown_requested() {
            return Ok(accepted);
        }

        let suggestions = self.provider.suggest(entity, max_candidates).await?;
        let mut known: HashSet<String> = HashSet::new();

        if let Some(featured) = suggestions.featured_url {
            if self.shutdown_requested() {
                info!("Shutdown requested, skipping validation");
                return Ok(accepted);
            }
            if self.validator.validate(&featured, entity).await {
                known.insert(featured.clone());
                accepted.push(ScoredHomepage::new(featured, FEATURED_SCORE));
            } else {
                debug!("Featured link {} failed validation", featured);
            }
        }

        let query = format!("{}{}", entity.name, entity.city);
        for url in suggestions.results {
            let score = ratio(&query, &url);
            if score <= self.min_score || known.contains(&url) {
                continue;
            }
            if self.shutdown_requested() {
                info!("Shutdown requested, skipping remaining candidates");
                break;
            }
            if self.validator.validate(&url, entity).await {
                known.insert(url.clone());
                accepted.push(ScoredHomepage::new(url, score));
            }
        }

        info!("Resolved {} homepage(s)", accepted.len());
        Ok(accepted)
    }
}
