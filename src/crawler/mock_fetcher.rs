//! # Mock Page Fetcher for Testing
//!
//! Provides a `MockFetcher` that implements the `PageFetcher` trait for use in
//! tests. Pages are registered up front, every requested URL is logged, and
//! unknown URLs answer with status 404, so traversal and validation can be
//! exercised without touching the network.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::crawler::error::FetchError;
use crate::crawler::fetcher::{FetchedPage, PageFetcher};

#[derive(Debug, Clone)]
enum Response {
    Page { status: u16, body: String },
    Unreachable,
}

/// A site simulated in memory.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    responses: HashMap<String, Response>,
    /// Requested URLs in order. Arc<Mutex<>> keeps the log shared between clones.
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    /// Creates a mock where every URL answers 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn page(self, url: &str, body: impl Into<String>) -> Self {
        self.response(url, 200, body)
    }

    /// Serve `body` with the given status at `url`.
    pub fn response(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Page {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Helper to serve a page that only consists of links.
    pub fn links(self, url: &str, hrefs: &[&str]) -> Self {
        let anchors: String = hrefs
            .iter()
            .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
            .collect();
        let body = format!("<html><body><h1>{}</h1>\n{}</body></html>", url, anchors);
        self.page(url, body)
    }

    /// Fail requests to `url` with a transport error.
    pub fn unreachable(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Unreachable);
        self
    }

    /// URLs requested so far, in order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    /// Number of requests made so far.
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.requests.lock().await.push(url.to_string());

        match self.responses.get(url) {
            Some(Response::Page { status, body }) => Ok(FetchedPage {
                url: url.to_string(),
                status_code: *status,
                body: body.clone(),
            }),
            Some(Response::Unreachable) => {
                Err(FetchError::Other(format!("connection refused: {}", url)))
            }
            None => Ok(FetchedPage {
                url: url.to_string(),
                status_code: 404,
                body: String::new(),
            }),
        }
    }
}
