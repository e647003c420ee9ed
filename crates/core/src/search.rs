//! Web search and page fetch abstractions.
//!
//! The research loop only ever talks to these two traits. Concrete
//! backends (DuckDuckGo HTML, offline placeholders, reqwest fetcher)
//! live in `sleuth-tools`.

use crate::error::{FetchError, SearchError};
use crate::text::truncate_chars;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One ranked hit returned by a search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, title: Option<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title,
            snippet: snippet.into(),
        }
    }
}

/// Readable content extracted from a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub text: String,
}

impl FetchedPage {
    /// A page built from nothing but a search snippet, used when a fetch fails.
    pub fn from_snippet(hit: &SearchHit) -> Self {
        Self {
            title: hit.title.clone(),
            description: None,
            text: hit.snippet.clone(),
        }
    }

    /// Title, description and body joined by blank lines, capped at `limit` chars.
    pub fn content(&self, limit: usize) -> String {
        let parts: Vec<&str> = [
            self.title.as_deref(),
            self.description.as_deref(),
            Some(self.text.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

        truncate_chars(&parts.join("\n\n"), limit).to_string()
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `max_results` hits for `query`, in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Retrieves the readable content of a URL.
#[async_trait]
pub trait FetchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}
