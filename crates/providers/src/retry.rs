//! Provider retry — bounded retries with exponential backoff and
//! per-attempt timeouts.
//!
//! Only transient failures (rate limits, network errors, timeouts, 5xx)
//! are retried. Everything else is returned on the first attempt.

use async_trait::async_trait;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wraps a provider and retries transient failures.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
    base_backoff: Duration,
    attempt_timeout: Duration,
}

impl RetryProvider {
    /// Defaults: 2 retries, 500 ms base backoff, 300 s per attempt.
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            inner,
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Backoff before retry number `retry` (0-based): base * 2^retry.
    fn backoff_for(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 0u32;

        loop {
            let result =
                match tokio::time::timeout(self.attempt_timeout, self.inner.complete(request.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        self.inner.name(),
                        self.attempt_timeout.as_secs()
                    ))),
                };

            match result {
                Ok(response) => {
                    if attempt > 0 {
                        info!(provider = %self.inner.name(), attempt = attempt + 1, "Retry succeeded");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.inner.list_models().await
    }
}
