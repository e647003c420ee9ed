//! Concurrency limiter — one semaphore shared by every task instance so
//! batch runs cannot flood the model endpoint.

use async_trait::async_trait;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::*;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

pub struct ConcurrencyLimitedProvider {
    inner: Arc<dyn Provider>,
    permits: Arc<Semaphore>,
}

impl ConcurrencyLimitedProvider {
    /// Allow at most `max_concurrent` in-flight calls (minimum 1).
    pub fn new(inner: Arc<dyn Provider>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Share an existing semaphore, e.g. across several providers.
    pub fn with_semaphore(inner: Arc<dyn Provider>, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Provider for ConcurrencyLimitedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::NotConfigured("concurrency limiter closed".into()))?;
        trace!(available = self.permits.available_permits(), "Acquired model call permit");
        self.inner.complete(request).await
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.inner.list_models().await
    }
}
