//! HTTP page fetcher.

use crate::html::parse_html;
use async_trait::async_trait;
use sleuth_core::error::FetchError;
use sleuth_core::search::{FetchProvider, FetchedPage};
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("sleuth/", env!("CARGO_PKG_VERSION"));

/// Bodies beyond this are cut off before parsing.
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Fetches pages over HTTP(S) and reduces them to readable text.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Append `chunk` to `body` without exceeding `limit`. Returns `true`
/// once the limit is reached.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    body.len() >= limit
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!(
            "{raw}: unsupported scheme '{other}'"
        ))),
    }
}

fn looks_like_html(content_type: Option<&str>, body: &str) -> bool {
    match content_type {
        Some(ct) => ct.contains("html"),
        None => body.trim_start().starts_with('<'),
    }
}

#[async_trait]
impl FetchProvider for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let parsed = validate_url(url)?;
        debug!(url, timeout_secs = timeout.as_secs(), "Fetching page");

        let mut response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                        timeout_secs: timeout.as_secs(),
                    }
                } else {
                    FetchError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        let mut raw = Vec::new();
        loop {
            let chunk = response.chunk().await.map_err(|e| FetchError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            let Some(chunk) = chunk else { break };
            if append_capped(&mut raw, &chunk, self.max_body_bytes) {
                debug!(url, limit = self.max_body_bytes, "Page body truncated");
                break;
            }
        }
        let body = String::from_utf8_lossy(&raw);

        if looks_like_html(content_type.as_deref(), &body) {
            Ok(parse_html(&body))
        } else {
            Ok(FetchedPage {
                title: None,
                description: None,
                text: crate::html::compact_ws(&body),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(validate_url("not a url"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(
            validate_url("ftp://example.com/file"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(validate_url("https://example.com/page").is_ok());
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html(Some("text/html; charset=utf-8"), ""));
        assert!(!looks_like_html(Some("application/json"), "<x>"));
        assert!(looks_like_html(None, "  <!doctype html>"));
        assert!(!looks_like_html(None, "plain"));
    }

    #[test]
    fn append_stops_at_limit() {
        let mut body = Vec::new();
        assert!(!append_capped(&mut body, b"hello", 8));
        assert!(append_capped(&mut body, b"world", 8));
        assert_eq!(body, b"hellowor");
        assert!(append_capped(&mut body, b"more", 8));
        assert_eq!(body.len(), 8);
    }

    #[tokio::test]
    async fn large_body_is_capped() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let body = "a".repeat(1024 * 1024);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
        });

        let fetcher = HttpFetcher::new().with_max_body_bytes(4096);
        let page = fetcher
            .fetch(&format!("http://{addr}/big"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(page.text.len(), 4096);
    }

    #[tokio::test]
    async fn invalid_url_fails_without_network() {
        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch("mailto:someone@example.com", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch("http://127.0.0.1:9/", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Network { .. } | FetchError::Timeout { .. }
        ));
    }
}
