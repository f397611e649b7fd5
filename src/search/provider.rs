//! Search-engine backed homepage suggestions

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, instrument};
use url::Url;

use super::error::SearchError;
use super::{SearchProvider, SearchSuggestions};
use crate::crawler::{FetchedPage, PageFetcher};
use crate::entity::Entity;

/// Default search endpoint
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.google.com/search";

static FEATURED_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.ab_button").unwrap());

static RESULT_HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());

// "Website", "Webseite", "Situs web", ...
static WEBSITE_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)web").unwrap());

/// Queries a search engine's HTML results page
///
/// The featured result is the first `a.ab_button` whose label mentions "web";
/// organic results are the links wrapping each `h3` heading.
#[derive(Debug, Clone)]
pub struct WebSearchProvider<F> {
    fetcher: F,
    endpoint: Url,
}

impl<F: PageFetcher> WebSearchProvider<F> {
    /// Create a provider for the default endpoint
    pub fn new(fetcher: F) -> Result<Self, SearchError> {
        Self::with_endpoint(fetcher, DEFAULT_SEARCH_ENDPOINT)
    }

    /// Create a provider for a custom endpoint, e.g. a self-hosted mirror
    pub fn with_endpoint(fetcher: F, endpoint: &str) -> Result<Self, SearchError> {
        Ok(Self {
            fetcher,
            endpoint: Url::parse(endpoint)?,
        })
    }

    /// Results page URL for `entity`
    pub fn search_url(&self, entity: &Entity, max_candidates: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &search_query(entity))
            .append_pair("num", &max_candidates.to_string());
        url
    }
}

impl<F: PageFetcher> SearchProvider for WebSearchProvider<F> {
    #[instrument(skip(self, entity), fields(entity = %entity.slug()))]
    async fn suggest(
        &self,
        entity: &Entity,
        max_candidates: usize,
    ) -> Result<SearchSuggestions, SearchError> {
        let url = self.search_url(entity, max_candidates);
        let page = self
            .fetcher
            .fetch(url.as_str())
            .await
            .and_then(FetchedPage::into_success)?;

        let suggestions = parse_results(&self.endpoint, &page.body, max_candidates);
        debug!(
            "Search returned {} results, featured: {:?}",
            suggestions.results.len(),
            suggestions.featured_url
        );
        Ok(suggestions)
    }
}

/// Query text for an entity: name, street, postal code and city
pub fn search_query(entity: &Entity) -> String {
    entity.identifying_fields().join(" ").replace('&', "and")
}

/// Extract the featured link and up to `max_candidates` result links
pub fn parse_results(base: &Url, html: &str, max_candidates: usize) -> SearchSuggestions {
    let document = Html::parse_document(html);

    let featured_url = document
        .select(&FEATURED_BUTTON)
        .filter(|a| WEBSITE_LABEL.is_match(&a.text().collect::<String>()))
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_result_link(base, href));

    let results = document
        .select(&RESULT_HEADING)
        .filter_map(|heading| {
            heading
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
        })
        .take(max_candidates)
        .filter_map(|href| resolve_result_link(base, href))
        .collect();

    SearchSuggestions {
        featured_url,
        results,
    }
}

/// Absolute target of a result link, unwrapping `/url?q=` redirects
fn resolve_result_link(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    let target = if url.path() == "/url" {
        let wrapped = url
            .query_pairs()
            .find(|(key, _)| key == "q" || key == "url")
            .map(|(_, value)| value.into_owned())?;
        Url::parse(&wrapped).ok()?
    } else {
        url
    };

    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}
