//! Persisted set of links already handled for one homepage's domain
//!
//! The frontier record is the resumability checkpoint of a traversal. Every
//! URL in it has had a fetch attempt, or was skipped because its page record
//! already existed, and is never fetched again by a resumed crawl. The record
//! is append-only and written through to the store on every change.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::crawler::storage::{StorageError, Store};

/// On-disk form of the frontier (`0-url-list.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierRecord {
    /// Homepage the traversal started from
    pub home_url: String,

    /// Links already handled, in the order they were marked
    #[serde(default)]
    pub sublinks: Vec<String>,
}

/// Seen-set of one traversal, backed by a [`FrontierRecord`]
#[derive(Debug)]
pub struct CrawlFrontier<'s, S: Store> {
    store: &'s S,
    key: String,
    record: FrontierRecord,
    seen: HashSet<String>,
}

impl<'s, S: Store> CrawlFrontier<'s, S> {
    /// Load the frontier stored at `key`, creating and persisting an empty one
    /// for `home_url` if none exists
    pub async fn load_or_create(
        store: &'s S,
        key: impl Into<String>,
        home_url: &str,
    ) -> Result<Self, StorageError> {
        let key = key.into();
        match store.load::<FrontierRecord>(&key).await? {
            Some(record) => {
                debug!("Loaded frontier {} with {} links", key, record.sublinks.len());
                let seen = record.sublinks.iter().cloned().collect();
                Ok(Self {
                    store,
                    key,
                    record,
                    seen,
                })
            }
            None => Self::create_fresh(store, key, home_url).await,
        }
    }

    /// Start an empty frontier for `home_url`, replacing any stored one
    pub async fn create_fresh(
        store: &'s S,
        key: impl Into<String>,
        home_url: &str,
    ) -> Result<Self, StorageError> {
        let frontier = Self {
            store,
            key: key.into(),
            record: FrontierRecord {
                home_url: home_url.to_string(),
                sublinks: Vec::new(),
            },
            seen: HashSet::new(),
        };
        frontier.persist().await?;
        Ok(frontier)
    }

    /// Whether `url` has already been handled
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Record `url` as handled and persist the change before returning.
    ///
    /// Returns false, without writing, if the URL was already known.
    pub async fn mark_seen(&mut self, url: &str) -> Result<bool, StorageError> {
        if !self.seen.insert(url.to_string()) {
            return Ok(false);
        }
        self.record.sublinks.push(url.to_string());
        self.persist().await?;
        Ok(true)
    }

    /// Every handled URL
    pub fn seen(&self) -> &HashSet<String> {
        &self.seen
    }

    /// Handled URLs in the order they were marked
    pub fn sublinks(&self) -> &[String] {
        &self.record.sublinks
    }

    pub fn len(&self) -> usize {
        self.record.sublinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.sublinks.is_empty()
    }

    async fn persist(&self) -> Result<(), StorageError> {
        self.store.save(&self.key, &self.record).await
    }
}
