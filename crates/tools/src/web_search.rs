//! Web search backends.
//!
//! [`DuckDuckGoSearch`] scrapes the DuckDuckGo HTML endpoint and never
//! fails: on any transport or status problem it logs a warning and returns
//! the same deterministic set [`PlaceholderSearch`] produces, so research
//! runs keep going offline.

use crate::html::{compact_ws, text_content};
use async_trait::async_trait;
use scraper::{Html, Selector};
use sleuth_core::error::SearchError;
use sleuth_core::search::{SearchHit, SearchProvider};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DDG_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Offline search returning three fixed hits per query.
pub struct PlaceholderSearch;

#[async_trait]
impl SearchProvider for PlaceholderSearch {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query, "Placeholder search");
        Ok(placeholder_results(query, max_results))
    }
}

/// The deterministic placeholder hits for `query`.
pub fn placeholder_results(query: &str, max_results: usize) -> Vec<SearchHit> {
    (0..3)
        .take(max_results)
        .map(|i| SearchHit {
            url: format!("https://example.com/result-{i}"),
            title: None,
            snippet: format!("Example search result {i} for query: {query}"),
        })
        .collect()
}

/// Search via the DuckDuckGo HTML interface.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            client,
            endpoint: DDG_ENDPOINT.to_string(),
            timeout,
        }
    }

    /// Point at a different HTML endpoint (mirrors, local fixtures).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch_results(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    SearchError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::RequestFailed(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        Ok(parse_ddg_results(&body, max_results))
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        match self.fetch_results(query, max_results).await {
            Ok(hits) => {
                debug!(query, hits = hits.len(), "DuckDuckGo search finished");
                Ok(hits)
            }
            Err(e) => {
                warn!(query, error = %e, "DuckDuckGo search failed, using placeholder results");
                Ok(placeholder_results(query, max_results))
            }
        }
    }
}

/// Parse `div.result` containers from a DuckDuckGo HTML results page.
pub fn parse_ddg_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(container_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for container in document.select(&container_sel) {
        if out.len() >= limit {
            break;
        }

        let Some(anchor) = container.select(&title_sel).next() else {
            continue;
        };
        let Some(url) = anchor.value().attr("href").and_then(normalize_search_href) else {
            continue;
        };

        let title = compact_ws(&text_content(anchor));
        let snippet = container
            .select(&snippet_sel)
            .next()
            .map(|el| compact_ws(&text_content(el)))
            .unwrap_or_default();

        out.push(SearchHit {
            url,
            title: Some(if title.is_empty() {
                "No title".to_string()
            } else {
                title
            }),
            snippet,
        });
    }
    out
}

fn absolutize_ddg_href(href: &str) -> String {
    let trimmed = href.trim();
    if trimmed.starts_with("//") {
        return format!("https:{trimmed}");
    }
    if trimmed.starts_with("/l/") {
        return format!("https://duckduckgo.com{trimmed}");
    }
    trimmed.to_string()
}

/// Unwrap `duckduckgo.com/l/?uddg=<target>` redirect links.
fn decode_ddg_redirect(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if !host.ends_with("duckduckgo.com") || !parsed.path().starts_with("/l/") {
        return None;
    }

    let target = parsed
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.trim().to_string())?;
    if !(target.starts_with("http://") || target.starts_with("https://")) {
        return None;
    }
    Some(target)
}

fn normalize_search_href(href: &str) -> Option<String> {
    let abs = absolutize_ddg_href(href);
    if abs.is_empty() {
        return None;
    }
    if let Some(decoded) = decode_ddg_redirect(&abs) {
        return Some(decoded);
    }
    (abs.starts_with("http://") || abs.starts_with("https://")).then_some(abs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html>
            <body>
                <div class="result">
                    <a class="result__a" href="https://example.com">Example Title</a>
                    <a class="result__url">https://example.com</a>
                    <div class="result__snippet">Example snippet text</div>
                </div>
                <div class="result">
                    <a class="result__a" href="https://example2.com">Example Title 2</a>
                    <a class="result__url">https://example2.com</a>
                    <div class="result__snippet">Example snippet text 2</div>
                </div>
            </body>
        </html>
    "#;

    #[test]
    fn parses_result_containers() {
        let hits = parse_ddg_results(RESULTS_PAGE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("Example Title"));
        assert_eq!(hits[0].url, "https://example.com");
        assert_eq!(hits[0].snippet, "Example snippet text");
        assert_eq!(hits[1].url, "https://example2.com");
        assert_eq!(hits[1].snippet, "Example snippet text 2");
    }

    #[test]
    fn respects_limit() {
        assert_eq!(parse_ddg_results(RESULTS_PAGE, 1).len(), 1);
        assert!(parse_ddg_results(RESULTS_PAGE, 0).is_empty());
    }

    #[test]
    fn decodes_redirect_links() {
        let html = r#"
            <div class="result">
                <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&rut=abc">Rust</a>
                <a class="result__snippet">A language</a>
            </div>
        "#;
        let hits = parse_ddg_results(html, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://www.rust-lang.org/");
        assert_eq!(hits[0].snippet, "A language");
    }

    #[test]
    fn missing_title_and_url_handling() {
        let html = r#"
            <div class="result"><a class="result__a" href="https://notitle.test"></a></div>
            <div class="result"><a class="result__a">No link</a></div>
        "#;
        let hits = parse_ddg_results(html, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title.as_deref(), Some("No title"));
        assert_eq!(hits[0].snippet, "");
    }

    #[test]
    fn relative_non_redirect_links_dropped() {
        assert_eq!(normalize_search_href("/settings"), None);
        assert_eq!(normalize_search_href("  "), None);
    }

    #[tokio::test]
    async fn placeholder_is_deterministic() {
        let first = PlaceholderSearch.search("rust async", 10).await.unwrap();
        let second = PlaceholderSearch.search("rust async", 10).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].url, "https://example.com/result-0");
        assert_eq!(first[2].snippet, "Example search result 2 for query: rust async");
    }

    #[tokio::test]
    async fn placeholder_truncates() {
        let hits = PlaceholderSearch.search("q", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back_to_placeholders() {
        let search = DuckDuckGoSearch::new(Duration::from_millis(200))
            .with_endpoint("http://127.0.0.1:9/html/");
        let hits = search.search("offline", 10).await.unwrap();
        assert_eq!(hits, placeholder_results("offline", 10));
    }
}
