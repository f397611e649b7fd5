//! Page fetching for validation, search and traversal
//!
//! [`PageFetcher`] is the seam between the crawl logic and the network.
//! [`HttpFetcher`] is the reqwest-backed implementation used by the binary;
//! tests substitute in-memory fakes.

use reqwest::Client as ReqwestClient;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::crawler::config::FetchConfig;
use crate::crawler::error::FetchError;

/// HTTP status accepted as a successful page load
pub const STATUS_OK: u16 = 200;

/// A fetched response, successful or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Decoded response body
    pub body: String,
}

impl FetchedPage {
    /// Whether the page loaded with status 200
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Turn a non-200 response into [`FetchError::Status`]
    pub fn into_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                url: self.url,
                status: self.status_code,
            })
        }
    }
}

/// Something that can load a URL
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`. Non-200 statuses are returned as pages; only transport
    /// failures are errors.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send;
}

impl<T: PageFetcher> PageFetcher for Arc<T> {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send {
        (**self).fetch(url)
    }
}

/// reqwest-backed fetcher with explicit timeouts and transport retries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: ReqwestClient,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a fetcher from the given configuration
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        // Certificate validation is off by default on purpose. Small business
        // sites routinely serve expired, self-signed or mismatched certificates,
        // and the crawler only reads public pages, so it trusts the network path
        // rather than lose those sites entirely. Set `accept_invalid_certs` to
        // false to restore strict validation.
        let client = ReqwestClient::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status_code,
            body,
        })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url)?;
        let mut attempt = 0;

        loop {
            match self.fetch_once(&parsed).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    warn!("Fetching {} failed ({}), retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => {
                    if let Ok(page) = &result {
                        debug!("Fetched {} with status {}", url, page.status_code);
                    }
                    return result;
                }
            }
        }
    }
}
