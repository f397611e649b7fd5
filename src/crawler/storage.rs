//! # Crawl Storage Module
//!
//! Persistence for overview, frontier and page records. Records are addressed
//! by a relative key such as `acme-pharmacy-springfield/overview/acme-pharmacy-springfield.json`
//! and stored behind the [`Store`] trait, so the on-disk JSON layout can be
//! swapped for another backend without touching the crawl logic.
//!
//! ## Key Components
//!
//! - `Store`: `load` / `save` / `exists` over serde types
//! - `JsonFileStore`: pretty-printed JSON files below a base directory
//! - `MemoryStore`: in-process map, shares its contents between clones
//! - `EntityLayout`: the key scheme for one entity's records
//!
//! Every `save` is durable when it returns; [`JsonFileStore`] writes a sibling
//! temporary file and renames it over the target, so a crash never leaves a
//! half-written record behind.

use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use url::Url;

use crate::error::Error as CrateError;
use crate::slug::{FRONTIER_STEM, domain_slug, page_slug};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL for storage: {0}")]
    InvalidUrl(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl From<StorageError> for CrateError {
    fn from(err: StorageError) -> Self {
        CrateError::Storage(err.to_string())
    }
}

type Result<T> = std::result::Result<T, StorageError>;

/// Key/value persistence for crawl records
pub trait Store: Send + Sync {
    /// Load the record at `key`, `None` if it does not exist
    fn load<T>(&self, key: &str) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Durably write `value` at `key`, replacing any previous record
    fn save<T>(&self, key: &str, value: &T) -> impl Future<Output = Result<()>> + Send
    where
        T: Serialize + Sync;

    /// Whether a record exists at `key`
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base path for storage
    pub base_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("output"),
        }
    }
}

/// JSON files below a base directory
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore {
    config: StorageConfig,
}

impl JsonFileStore {
    /// Create a store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_config(StorageConfig {
            base_path: base_path.into(),
        })
    }

    /// Create a new storage with custom configuration
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Base directory of the store
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Gets the file path for a given key
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.config.base_path.join(relative))
    }
}

impl Store for JsonFileStore {
    async fn load<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).await?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &json).await?;
            file.sync_all().await?;
        }
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(path).await?)
    }
}

/// In-memory store; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Store for MemoryStore {
    async fn load<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.records.lock().await.get(key).cloned();
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn save<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        self.records.lock().await.insert(key.to_string(), json);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.records.lock().await.contains_key(key))
    }
}

/// Key scheme for one entity's records
///
/// ```text
/// <entity>/overview/<entity>.json
/// <entity>/subpages/<domain>/0-url-list.json
/// <entity>/subpages/<domain>/<page>.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLayout {
    entity_slug: String,
}

impl EntityLayout {
    pub fn new(entity_slug: impl Into<String>) -> Self {
        Self {
            entity_slug: entity_slug.into(),
        }
    }

    /// Slug of the entity this layout belongs to
    pub fn entity_slug(&self) -> &str {
        &self.entity_slug
    }

    /// Key of the overview record
    pub fn overview_key(&self) -> String {
        format!("{0}/overview/{0}.json", self.entity_slug)
    }

    /// Key of the frontier record for the domain of `home_url`
    pub fn frontier_key(&self, home_url: &str) -> Result<String> {
        let url = parse_with_host(home_url)?;
        Ok(format!("{}/{}.json", self.domain_dir(&url), FRONTIER_STEM))
    }

    /// Key of the page record for `page_url`
    pub fn page_key(&self, page_url: &str) -> Result<String> {
        let url = parse_with_host(page_url)?;
        Ok(format!("{}/{}.json", self.domain_dir(&url), page_slug(&url)))
    }

    fn domain_dir(&self, url: &Url) -> String {
        format!("{}/subpages/{}", self.entity_slug, domain_slug(url))
    }
}

fn parse_with_host(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.host_str().is_none() {
        return Err(StorageError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}
