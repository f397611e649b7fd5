//! Resumable same-domain traversal of one homepage
//!
//! The traversal is depth-first over an explicit stack. The seen-set lives in
//! the [`CrawlFrontier`] and is shared by every branch, so no URL is fetched
//! twice within a traversal or across resumed runs. A single counter of fetch
//! attempts bounds the whole traversal.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::PageRecord;
use crate::crawler::content_extraction::{extract_links, extract_text};
use crate::crawler::error::CrawlError;
use crate::crawler::fetcher::{FetchedPage, PageFetcher};
use crate::crawler::frontier::CrawlFrontier;
use crate::crawler::normalizer::scope_and_dedup_with_known;
use crate::crawler::storage::{EntityLayout, Store};

/// Summary of one homepage traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Homepage the traversal started from
    pub home_url: String,

    /// Fetch attempts, counted against `max_pages`
    pub pages_fetched: usize,

    /// Page records written
    pub pages_saved: usize,

    /// Fetches that failed or returned a non-200 status
    pub pages_failed: usize,

    /// Links skipped because their page record already existed
    pub pages_resumed: usize,

    /// Unvisited links remained when the page budget ran out
    pub budget_exhausted: bool,

    /// Stopped early because shutdown was requested
    pub interrupted: bool,

    /// Frontier contents when the traversal ended
    pub sublinks: Vec<String>,
}

/// Walks a homepage's domain, persisting a [`PageRecord`] per visited page
#[derive(Debug)]
pub struct RecursiveCrawler<F, S> {
    fetcher: F,
    store: S,
    shutdown: Arc<AtomicBool>,
}

impl<F: PageFetcher, S: Store> RecursiveCrawler<F, S> {
    /// Create a crawler over the given fetcher and store
    pub fn new(fetcher: F, store: S) -> Self {
        Self {
            fetcher,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop before the next fetch once `flag` is set
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Whether shutdown has been requested
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Crawl every page reachable from `home_url` on the same host
    ///
    /// # Arguments
    ///
    /// * `home_url` - The homepage to start from
    /// * `layout` - Key scheme of the entity the homepage belongs to
    /// * `max_pages` - Maximum number of fetches for the whole traversal
    /// * `resume` - Continue from the stored frontier and keep existing page
    ///   records; otherwise start over with an empty frontier
    ///
    /// # Returns
    ///
    /// A report of the traversal. Fetch failures are counted, not returned;
    /// only storage failures and an unparsable `home_url` are errors.
    #[instrument(skip(self, layout), fields(entity = layout.entity_slug()))]
    pub async fn crawl(
        &self,
        home_url: &str,
        layout: &EntityLayout,
        max_pages: usize,
        resume: bool,
    ) -> Result<CrawlReport, CrawlError> {
        let root = Url::parse(home_url)?.to_string();
        let frontier_key = layout.frontier_key(home_url)?;
        let mut frontier = if resume {
            CrawlFrontier::load_or_create(&self.store, frontier_key, home_url).await?
        } else {
            CrawlFrontier::create_fresh(&self.store, frontier_key, home_url).await?
        };

        let mut report = CrawlReport {
            home_url: home_url.to_string(),
            ..Default::default()
        };
        let mut stack: Vec<String> = Vec::new();

        info!(
            "Crawling {} (max {} pages, {} known links)",
            home_url,
            max_pages,
            frontier.len()
        );

        // The root is always fetched so that a resumed run can rediscover
        // its links; an existing root record is left untouched.
        if self.shutdown_requested() {
            report.interrupted = true;
        } else if max_pages == 0 {
            report.budget_exhausted = true;
        } else {
            let root_key = layout.page_key(&root)?;
            let keep_record = resume && self.store.exists(&root_key).await?;
            if let Some(body) = self
                .visit(&root, &root_key, !keep_record, &mut frontier, &mut report)
                .await?
            {
                push_neighbors(&root, &body, &frontier, &mut stack)?;
            }
        }

        while let Some(url) = stack.pop() {
            if frontier.contains(&url) {
                continue;
            }
            if self.shutdown_requested() {
                info!("Shutdown requested, leaving {} unvisited", home_url);
                report.interrupted = true;
                break;
            }
            if report.pages_fetched >= max_pages {
                debug!("Page budget of {} reached for {}", max_pages, home_url);
                report.budget_exhausted = true;
                break;
            }

            let key = layout.page_key(&url)?;
            if resume && self.store.exists(&key).await? {
                debug!("Already stored, not expanding {}", url);
                frontier.mark_seen(&url).await?;
                report.pages_resumed += 1;
                continue;
            }

            if let Some(body) = self
                .visit(&url, &key, true, &mut frontier, &mut report)
                .await?
            {
                push_neighbors(&url, &body, &frontier, &mut stack)?;
            }
        }

        report.sublinks = frontier.sublinks().to_vec();
        info!(
            "Finished {}: {} fetched, {} saved, {} failed, {} resumed",
            home_url,
            report.pages_fetched,
            report.pages_saved,
            report.pages_failed,
            report.pages_resumed
        );
        Ok(report)
    }

    /// Fetch one page, persist its record and mark it seen.
    ///
    /// Returns the body for link discovery, or `None` if the page is dead.
    async fn visit(
        &self,
        url: &str,
        key: &str,
        write_record: bool,
        frontier: &mut CrawlFrontier<'_, S>,
        report: &mut CrawlReport,
    ) -> Result<Option<String>, CrawlError> {
        report.pages_fetched += 1;

        let page = match self
            .fetcher
            .fetch(url)
            .await
            .and_then(FetchedPage::into_success)
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                report.pages_failed += 1;
                frontier.mark_seen(url).await?;
                return Ok(None);
            }
        };

        if write_record {
            let record = PageRecord {
                url: url.to_string(),
                text: extract_text(&page.body),
            };
            self.store.save(key, &record).await?;
            report.pages_saved += 1;
        }
        frontier.mark_seen(url).await?;

        Ok(Some(page.body))
    }
}

/// Push the unseen neighbors of `url` so the smallest is popped first
fn push_neighbors<S: Store>(
    url: &str,
    body: &str,
    frontier: &CrawlFrontier<'_, S>,
    stack: &mut Vec<String>,
) -> Result<(), CrawlError> {
    let base = Url::parse(url)?;
    let neighbors = scope_and_dedup_with_known(&base, extract_links(body), frontier.seen());
    stack.extend(
        neighbors
            .into_iter()
            .rev()
            .filter(|link| !frontier.contains(link)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::frontier::FrontierRecord;
    use crate::crawler::mock_fetcher::MockFetcher;
    use crate::crawler::storage::MemoryStore;

    const HOME: &str = "https://acme-pharmacy.com/";

    fn layout() -> EntityLayout {
        EntityLayout::new("acme-pharmacy-springfield")
    }

    fn url(path: &str) -> String {
        format!("https://acme-pharmacy.com{}", path)
    }

    /// Home linking to five pages, none of which link further
    fn five_page_site() -> MockFetcher {
        let mut site = MockFetcher::new().links(HOME, &["/p1", "/p2", "/p3", "/p4", "/p5"]);
        for i in 1..=5 {
            site = site.page(&url(&format!("/p{}", i)), format!("<p>Page {}</p>", i));
        }
        site
    }

    async fn page_records(store: &MemoryStore) -> Vec<String> {
        store
            .keys()
            .await
            .into_iter()
            .filter(|k| !k.ends_with("0-url-list.json"))
            .collect()
    }

    #[tokio::test]
    async fn test_crawl_follows_normalized_links() {
        let site = MockFetcher::new()
            .links(
                HOME,
                &[
                    "/about",
                    "/about#team",
                    "/contact",
                    "mailto:x@y.com",
                    "https://external.com/page",
                    "/logo.png",
                ],
            )
            .links(&url("/about"), &["/team", "/"])
            .page(&url("/contact"), "<p>Call  us\n today</p>")
            .page(&url("/team"), "<p>Team</p>");
        let store = MemoryStore::new();
        let crawler = RecursiveCrawler::new(site.clone(), store.clone());

        let report = crawler
            .crawl("https://acme-pharmacy.com", &layout(), 10, false)
            .await
            .unwrap();

        assert_eq!(report.pages_fetched, 4);
        assert_eq!(report.pages_saved, 4);
        assert!(!report.budget_exhausted);
        assert_eq!(
            site.requests().await,
            vec![HOME.to_string(), url("/about"), url("/team"), url("/contact")]
        );

        let contact: PageRecord = store
            .load(&layout().page_key(&url("/contact")).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.text, "Call us today");

        let frontier: FrontierRecord = store
            .load(&layout().frontier_key(HOME).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frontier.home_url, "https://acme-pharmacy.com");
        assert_eq!(frontier.sublinks, report.sublinks);
        assert_eq!(frontier.sublinks.len(), 4);
    }

    #[tokio::test]
    async fn test_scheme_variant_of_a_link_is_fetched_once() {
        let site = MockFetcher::new()
            .links(HOME, &["/about", "http://acme-pharmacy.com/about"])
            .page(&url("/about"), "<p>About</p>");
        let store = MemoryStore::new();
        let crawler = RecursiveCrawler::new(site.clone(), store.clone());

        let report = crawler.crawl(HOME, &layout(), 10, false).await.unwrap();

        assert_eq!(site.requests().await, vec![HOME.to_string(), url("/about")]);
        assert_eq!(report.pages_saved, 2);
    }

    #[tokio::test]
    async fn test_max_pages_limits_records() {
        let store = MemoryStore::new();
        let crawler = RecursiveCrawler::new(five_page_site(), store.clone());

        let report = crawler.crawl(HOME, &layout(), 3, false).await.unwrap();

        assert_eq!(report.pages_fetched, 3);
        assert!(report.budget_exhausted);
        assert_eq!(page_records(&store).await.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_count_never_exceeds_budget() {
        for max_pages in 0..8 {
            let site = five_page_site();
            let crawler = RecursiveCrawler::new(site.clone(), MemoryStore::new());
            crawler.crawl(HOME, &layout(), max_pages, false).await.unwrap();
            assert!(site.request_count().await <= max_pages);
            assert_eq!(site.request_count().await, max_pages.min(6));
        }
    }

    #[tokio::test]
    async fn test_cycles_are_visited_once() {
        let site = MockFetcher::new()
            .links(HOME, &["/a", "/b"])
            .links(&url("/a"), &["/", "/b", "/a"])
            .links(&url("/b"), &["/a", "/"]);
        let crawler = RecursiveCrawler::new(site.clone(), MemoryStore::new());

        crawler.crawl(HOME, &layout(), 100, false).await.unwrap();

        assert_eq!(
            site.requests().await,
            vec![HOME.to_string(), url("/a"), url("/b")]
        );
    }

    #[tokio::test]
    async fn test_dead_links_are_pruned() {
        let site = MockFetcher::new()
            .links(HOME, &["/broken", "/gone", "/offline"])
            .response(&url("/gone"), 500, "oops")
            .unreachable(&url("/offline"));
        let store = MemoryStore::new();
        let crawler = RecursiveCrawler::new(site.clone(), store.clone());

        let report = crawler.crawl(HOME, &layout(), 100, false).await.unwrap();

        assert_eq!(report.pages_fetched, 4);
        assert_eq!(report.pages_failed, 3);
        assert_eq!(report.pages_saved, 1);
        assert_eq!(page_records(&store).await.len(), 1);
        // Dead links are remembered so they are never retried
        assert_eq!(report.sublinks.len(), 4);
    }

    #[tokio::test]
    async fn test_resume_never_refetches_known_links() {
        let store = MemoryStore::new();
        let layout = layout();
        let (a, b) = (url("/p1"), url("/p2"));

        store
            .save(
                &layout.frontier_key(HOME).unwrap(),
                &FrontierRecord {
                    home_url: HOME.to_string(),
                    sublinks: vec![a.clone(), b.clone()],
                },
            )
            .await
            .unwrap();
        for link in [&a, &b] {
            let record = PageRecord {
                url: link.clone(),
                text: "stored".to_string(),
            };
            store
                .save(&layout.page_key(link).unwrap(), &record)
                .await
                .unwrap();
        }
        // p3 has a record but never made it into the frontier
        let p3 = url("/p3");
        store
            .save(
                &layout.page_key(&p3).unwrap(),
                &PageRecord {
                    url: p3.clone(),
                    text: "stored".to_string(),
                },
            )
            .await
            .unwrap();

        let site = five_page_site();
        let crawler = RecursiveCrawler::new(site.clone(), store.clone());
        let report = crawler.crawl(HOME, &layout, 100, true).await.unwrap();

        assert_eq!(
            site.requests().await,
            vec![HOME.to_string(), url("/p4"), url("/p5")]
        );
        assert_eq!(report.pages_resumed, 1);
        assert!(report.sublinks.contains(&p3));

        let kept: PageRecord = store
            .load(&layout.page_key(&a).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.text, "stored");
    }

    #[tokio::test]
    async fn test_without_resume_starts_over() {
        let store = MemoryStore::new();
        let site = five_page_site();
        let crawler = RecursiveCrawler::new(site.clone(), store.clone());

        crawler.crawl(HOME, &layout(), 100, false).await.unwrap();
        crawler.crawl(HOME, &layout(), 100, false).await.unwrap();

        assert_eq!(site.request_count().await, 12);
    }

    #[tokio::test]
    async fn test_resume_keeps_existing_home_record() {
        let store = MemoryStore::new();
        let layout = layout();
        let home_record = PageRecord {
            url: HOME.to_string(),
            text: "first visit".to_string(),
        };
        store
            .save(&layout.page_key(HOME).unwrap(), &home_record)
            .await
            .unwrap();

        let site = MockFetcher::new().page(HOME, "<p>second visit</p>");
        let crawler = RecursiveCrawler::new(site.clone(), store.clone());
        let report = crawler.crawl(HOME, &layout, 10, true).await.unwrap();

        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.pages_saved, 0);
        let stored: PageRecord = store
            .load(&layout.page_key(HOME).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, home_record);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_fetching() {
        let flag = Arc::new(AtomicBool::new(true));
        let site = five_page_site();
        let crawler = RecursiveCrawler::new(site.clone(), MemoryStore::new()).with_shutdown(flag);

        let report = crawler.crawl(HOME, &layout(), 100, false).await.unwrap();

        assert!(report.interrupted);
        assert_eq!(site.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_home_url() {
        let crawler = RecursiveCrawler::new(MockFetcher::new(), MemoryStore::new());
        let result = crawler.crawl("not a url", &layout(), 10, false).await;
        assert!(matches!(result, Err(CrawlError::UrlParse(_))));
    }
}
