//! # Entity Crawl Orchestration
//!
//! Drives the whole pipeline for one entity: resolve its homepages, persist
//! the overview record, crawl every homepage and checkpoint the overview after
//! each traversal. [`EntityCrawlOrchestrator::process`] is the batch entry
//! point; it contains every failure of a single entity, including panics, and
//! records it in the append-only error log.
//!
//! Also home to the output audit used by the `check` command.

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn};

use crate::crawler::{
    CrawlerConfig, EntityLayout, JsonFileStore, PageFetcher, RecursiveCrawler, Store,
};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::resolver::{HomepageResolver, HomepageValidator, ScoredHomepage};
use crate::search::SearchProvider;

/// File name of the error log inside the log directory
pub const ERROR_LOG_FILE: &str = "errors.txt";

/// Per-entity summary persisted at `<slug>/overview/<slug>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    #[serde(flatten)]
    pub entity: Entity,

    /// Validated homepages in discovery order
    #[serde(default)]
    pub suggestions: Vec<ScoredHomepage>,
}

impl Overview {
    pub fn new(entity: Entity, suggestions: Vec<ScoredHomepage>) -> Self {
        Self {
            entity,
            suggestions,
        }
    }
}

/// Append-only log of entity failures
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Log to `errors.txt` inside `log_dir`
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self {
            path: log_dir.as_ref().join(ERROR_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line: timestamp, entity slug and the full error chain
    pub async fn append(&self, slug: &str, err: &(dyn std::error::Error + 'static)) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let line = format!("{} {}: {}\n", Utc::now().to_rfc3339(), slug, error_chain(err));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs resolution and crawling for one entity at a time
#[derive(Debug)]
pub struct EntityCrawlOrchestrator<P, V, F, S> {
    resolver: HomepageResolver<P, V>,
    crawler: RecursiveCrawler<F, S>,
    config: CrawlerConfig,
    error_log: ErrorLog,
}

impl<P, V, F, S> EntityCrawlOrchestrator<P, V, F, S>
where
    P: SearchProvider,
    V: HomepageValidator,
    F: PageFetcher,
    S: Store,
{
    pub fn new(
        resolver: HomepageResolver<P, V>,
        crawler: RecursiveCrawler<F, S>,
        config: CrawlerConfig,
        error_log: ErrorLog,
    ) -> Self {
        Self {
            resolver,
            crawler,
            config,
            error_log,
        }
    }

    /// Whether the shared shutdown flag has been set
    pub fn shutdown_requested(&self) -> bool {
        self.crawler.shutdown_requested() || self.resolver.shutdown_requested()
    }

    /// Resolve and crawl one entity, propagating the first failure
    #[instrument(skip(self, entity), fields(entity = %entity.slug()))]
    pub async fn run_entity(&self, entity: &Entity) -> Result<Overview> {
        let layout = EntityLayout::new(entity.slug());
        let overview_key = layout.overview_key();
        let store = self.crawler.store();

        let reusable = if self.config.resume {
            store
                .load::<Overview>(&overview_key)
                .await?
                .filter(|overview| !overview.suggestions.is_empty())
        } else {
            None
        };

        let mut overview = match reusable {
            Some(overview) => {
                info!("Reusing {} stored homepage(s)", overview.suggestions.len());
                overview
            }
            None => {
                let suggestions = self
                    .resolver
                    .resolve(entity, self.config.search_qty)
                    .await?;
                let overview = Overview::new(entity.clone(), suggestions);
                if self.shutdown_requested() {
                    info!("Shutdown requested, overview left unsaved");
                    return Ok(overview);
                }
                store.save(&overview_key, &overview).await?;
                overview
            }
        };

        for index in 0..overview.suggestions.len() {
            if self.shutdown_requested() {
                info!("Shutdown requested, skipping remaining homepages");
                break;
            }

            let home_url = overview.suggestions[index].url.clone();
            let report = self
                .crawler
                .crawl(
                    &home_url,
                    &layout,
                    self.config.max_pages,
                    self.config.resume,
                )
                .await?;

            overview.suggestions[index].subpages = report.sublinks;
            store.save(&overview_key, &overview).await?;
        }

        Ok(overview)
    }

    /// Run one entity, logging any error or panic instead of returning it.
    ///
    /// Returns the overview on success.
    pub async fn process(&self, entity: &Entity) -> Option<Overview> {
        let slug = entity.slug();
        let outcome = AssertUnwindSafe(self.run_entity(entity))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Error::Panic(panic_message(payload.as_ref()))));

        match outcome {
            Ok(overview) => Some(overview),
            Err(err) => {
                error!("Failed to process {}: {}", slug, err);
                if let Err(log_err) = self.error_log.append(&slug, &err).await {
                    warn!(
                        "Could not write to {}: {}",
                        self.error_log.path().display(),
                        log_err
                    );
                }
                None
            }
        }
    }
}

/// Problem found in an entity folder of the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFinding {
    /// No overview record
    MissingOverview { entity_slug: String },
    /// Overview without any validated homepage
    NoSuggestions { entity_slug: String },
}

impl std::fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditFinding::MissingOverview { entity_slug } => {
                write!(f, "{}: missing overview", entity_slug)
            }
            AuditFinding::NoSuggestions { entity_slug } => {
                write!(f, "{}: no homepage suggestions", entity_slug)
            }
        }
    }
}

/// Scan every entity folder below `output_dir`, sorted by name
pub async fn check_output(output_dir: impl AsRef<Path>) -> Result<Vec<AuditFinding>> {
    let output_dir = output_dir.as_ref();
    let store = JsonFileStore::new(output_dir);

    let mut slugs = Vec::new();
    let mut entries = fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            slugs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    slugs.sort();

    let mut findings = Vec::new();
    for entity_slug in slugs {
        let key = EntityLayout::new(entity_slug.as_str()).overview_key();
        match store.load::<Overview>(&key).await? {
            None => findings.push(AuditFinding::MissingOverview { entity_slug }),
            Some(overview) if overview.suggestions.is_empty() => {
                findings.push(AuditFinding::NoSuggestions { entity_slug })
            }
            Some(_) => {}
        }
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::mock_fetcher::MockFetcher;
    use crate::crawler::{MemoryStore, StorageError};
    use crate::resolver::{ContentValidator, MatchPolicy};
    use crate::search::{SearchError, SearchSuggestions};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::tempdir;

    const HOME: &str = "https://acme.example/";
    const HOME_BODY: &str = "<html><body><h1>Acme Pharmacy</h1>\
        <p>Main Street 1, 12345 Springfield</p>\
        <a href=\"/about\">About</a><a href=\"/contact\">Contact</a></body></html>";

    /// Provider that counts its calls and offers one featured link
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl SearchProvider for CountingProvider {
        async fn suggest(
            &self,
            _entity: &Entity,
            _max_candidates: usize,
        ) -> std::result::Result<SearchSuggestions, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchSuggestions {
                featured_url: Some(HOME.to_string()),
                results: Vec::new(),
            })
        }
    }

    struct FailingProvider;

    impl SearchProvider for FailingProvider {
        async fn suggest(
            &self,
            _entity: &Entity,
            _max_candidates: usize,
        ) -> std::result::Result<SearchSuggestions, SearchError> {
            Err(SearchError::ResultProcessing("quota exceeded".to_string()))
        }
    }

    struct PanickingProvider;

    impl SearchProvider for PanickingProvider {
        async fn suggest(
            &self,
            _entity: &Entity,
            _max_candidates: usize,
        ) -> std::result::Result<SearchSuggestions, SearchError> {
            panic!("provider exploded");
        }
    }

    fn acme() -> Entity {
        Entity::new(7, "Acme Pharmacy", "Main Street 1", "12345", "Springfield")
    }

    fn site() -> MockFetcher {
        MockFetcher::new()
            .page(HOME, HOME_BODY)
            .page("https://acme.example/about", "<p>About Acme</p>")
            .page("https://acme.example/contact", "<p>Call us</p>")
    }

    fn orchestrator<P: SearchProvider>(
        provider: P,
        fetcher: MockFetcher,
        store: MemoryStore,
        config: CrawlerConfig,
        log_dir: &Path,
    ) -> EntityCrawlOrchestrator<P, ContentValidator<MockFetcher>, MockFetcher, MemoryStore> {
        let resolver =
            HomepageResolver::new(provider, ContentValidator::new(fetcher.clone(), MatchPolicy::Any));
        let crawler = RecursiveCrawler::new(fetcher, store);
        EntityCrawlOrchestrator::new(resolver, crawler, config, ErrorLog::new(log_dir))
    }

    #[test]
    fn test_overview_round_trip() {
        let overview = Overview::new(
            acme(),
            vec![ScoredHomepage {
                url: HOME.to_string(),
                score: 100,
                subpages: vec![HOME.to_string(), "https://acme.example/about".to_string()],
            }],
        );

        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["postal_code"], "12345");
        assert_eq!(json["suggestions"][0]["score"], 100);

        let parsed: Overview = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, overview);
    }

    #[test]
    fn test_overview_accepts_legacy_keys() {
        let json = r#"{"_id": 3, "name": "Acme", "street": "Main Street 1",
            "zip": "01234", "city": "Springfield", "suggestions": []}"#;
        let overview: Overview = serde_json::from_str(json).unwrap();
        assert_eq!(overview.entity.id, 3);
        assert_eq!(overview.entity.postal_code, "01234");
    }

    #[tokio::test]
    async fn test_run_entity_persists_overview_with_subpages() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let runner = orchestrator(
            CountingProvider::default(),
            site(),
            store.clone(),
            CrawlerConfig::default(),
            dir.path(),
        );

        let overview = runner.run_entity(&acme()).await.unwrap();
        assert_eq!(overview.suggestions.len(), 1);
        assert_eq!(
            overview.suggestions[0].subpages,
            vec![
                HOME.to_string(),
                "https://acme.example/about".to_string(),
                "https://acme.example/contact".to_string()
            ]
        );

        let key = EntityLayout::new(acme().slug()).overview_key();
        let stored: Overview = store.load(&key).await.unwrap().unwrap();
        assert_eq!(stored, overview);
    }

    #[tokio::test]
    async fn test_resume_reuses_stored_overview() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let config = CrawlerConfig::builder().resume(true).build();
        let runner = orchestrator(
            CountingProvider::default(),
            site(),
            store.clone(),
            config,
            dir.path(),
        );

        runner.run_entity(&acme()).await.unwrap();
        runner.run_entity(&acme()).await.unwrap();
        assert_eq!(runner.resolver_calls(), 1);
    }

    #[tokio::test]
    async fn test_process_logs_errors_and_continues() {
        let dir = tempdir().unwrap();
        let runner = orchestrator(
            FailingProvider,
            site(),
            MemoryStore::new(),
            CrawlerConfig::default(),
            dir.path(),
        );

        assert!(runner.process(&acme()).await.is_none());

        let log = std::fs::read_to_string(dir.path().join(ERROR_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("acme-pharmacy-springfield"));
        assert!(log.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_process_contains_panics() {
        let dir = tempdir().unwrap();
        let runner = orchestrator(
            PanickingProvider,
            site(),
            MemoryStore::new(),
            CrawlerConfig::default(),
            dir.path(),
        );

        assert!(runner.process(&acme()).await.is_none());
        assert!(runner.process(&acme()).await.is_none());

        let log = std::fs::read_to_string(dir.path().join(ERROR_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains("provider exploded"));
    }

    #[tokio::test]
    async fn test_shutdown_skips_resolution_and_crawling() {
        let dir = tempdir().unwrap();
        let fetcher = site();
        let store = MemoryStore::new();
        let flag = Arc::new(AtomicBool::new(true));
        let resolver = HomepageResolver::new(
            CountingProvider::default(),
            ContentValidator::new(fetcher.clone(), MatchPolicy::Any),
        )
        .with_shutdown(flag.clone());
        let crawler =
            RecursiveCrawler::new(fetcher.clone(), store.clone()).with_shutdown(flag.clone());
        let runner = EntityCrawlOrchestrator::new(
            resolver,
            crawler,
            CrawlerConfig::default(),
            ErrorLog::new(dir.path()),
        );

        let overview = runner.run_entity(&acme()).await.unwrap();
        assert!(overview.suggestions.is_empty());
        assert_eq!(runner.resolver_calls(), 0);
        assert_eq!(fetcher.request_count().await, 0);
        assert!(store.keys().await.is_empty());
    }

    /// Store whose writes below `prefix` fail
    struct FailingStore {
        inner: MemoryStore,
        prefix: String,
    }

    impl Store for FailingStore {
        async fn load<T>(&self, key: &str) -> std::result::Result<Option<T>, StorageError>
        where
            T: serde::de::DeserializeOwned + Send,
        {
            self.inner.load(key).await
        }

        async fn save<T>(&self, key: &str, value: &T) -> std::result::Result<(), StorageError>
        where
            T: Serialize + Sync,
        {
            if key.starts_with(&self.prefix) && key.ends_with("0-url-list.json") {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(key, value).await
        }

        async fn exists(&self, key: &str) -> std::result::Result<bool, StorageError> {
            self.inner.exists(key).await
        }
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_only_that_entity() {
        let dir = tempdir().unwrap();
        let fetcher = site();
        let inner = MemoryStore::new();
        let store = FailingStore {
            inner: inner.clone(),
            prefix: format!("{}/", acme().slug()),
        };
        let resolver = HomepageResolver::new(
            CountingProvider::default(),
            ContentValidator::new(fetcher.clone(), MatchPolicy::Any),
        );
        let runner = EntityCrawlOrchestrator::new(
            resolver,
            RecursiveCrawler::new(fetcher, store),
            CrawlerConfig::default(),
            ErrorLog::new(dir.path()),
        );

        assert!(runner.process(&acme()).await.is_none());

        let log = std::fs::read_to_string(dir.path().join(ERROR_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("acme-pharmacy-springfield: Storage error"));
        assert!(log.contains("disk full"));

        let other = Entity::new(8, "Beta Apotheke", "Main Street 1", "12345", "Shelbyville");
        let overview = runner.process(&other).await.unwrap();
        assert_eq!(overview.suggestions[0].subpages.len(), 3);
        assert!(
            inner
                .exists(&EntityLayout::new(other.slug()).overview_key())
                .await
                .unwrap()
        );

        let log = std::fs::read_to_string(dir.path().join(ERROR_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_check_output_reports_incomplete_entities() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let complete = Overview::new(acme(), vec![ScoredHomepage::new(HOME, 100)]);
        store
            .save(&EntityLayout::new("complete").overview_key(), &complete)
            .await
            .unwrap();
        let empty = Overview::new(acme(), Vec::new());
        store
            .save(&EntityLayout::new("empty").overview_key(), &empty)
            .await
            .unwrap();
        std::fs::create_dir_all(dir.path().join("missing/subpages")).unwrap();

        let findings = check_output(dir.path()).await.unwrap();
        assert_eq!(
            findings,
            vec![
                AuditFinding::NoSuggestions {
                    entity_slug: "empty".to_string()
                },
                AuditFinding::MissingOverview {
                    entity_slug: "missing".to_string()
                },
            ]
        );
    }

    impl<V, F, S> EntityCrawlOrchestrator<CountingProvider, V, F, S> {
        fn resolver_calls(&self) -> usize {
            self.resolver.provider().calls.load(Ordering::SeqCst)
        }
    }
}
