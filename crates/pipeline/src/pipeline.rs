//! Research pipeline — research, evaluate, persist.

use crate::result::{PipelineResult, RunMetadata};
use crate::store::ResultStore;
use chrono::Utc;
use futures::StreamExt;
use sleuth_agent::{Agent, Evaluator, ModelSession, ResearchLoop};
use sleuth_config::AppConfig;
use sleuth_core::error::Result;
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::provider::Provider;
use sleuth_core::search::{FetchProvider, SearchProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs research queries end to end.
///
/// Every `run` builds fresh agents, so concurrent runs share nothing but
/// the gateway (and its concurrency limit).
pub struct ResearchPipeline {
    config: AppConfig,
    provider: Arc<dyn Provider>,
    search: Arc<dyn SearchProvider>,
    fetch: Arc<dyn FetchProvider>,
    store: Option<ResultStore>,
    events: Option<Arc<EventBus>>,
    cancel: Option<CancellationToken>,
}

impl ResearchPipeline {
    /// Results are saved to `output.dir` when `output.save_results` is set.
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        search: Arc<dyn SearchProvider>,
        fetch: Arc<dyn FetchProvider>,
    ) -> Self {
        let store = config
            .output
            .save_results
            .then(|| ResultStore::new(&config.output.dir));
        Self {
            config,
            provider,
            search,
            fetch,
            store,
            events: None,
            cancel: None,
        }
    }

    /// Replace (or disable, with `None`) the result store.
    pub fn with_store(mut self, store: Option<ResultStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_evaluation(mut self, evaluate: bool) -> Self {
        self.config.research.evaluate = evaluate;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn prepare(&self, mut session: ModelSession) -> ModelSession {
        if let Some(events) = &self.events {
            session = session.with_events(events.clone());
        }
        if let Some(token) = &self.cancel {
            session = session.with_cancellation(token.clone());
        }
        session
    }

    fn research_loop(&self) -> ResearchLoop {
        ResearchLoop::from_config(
            &self.config,
            self.provider.clone(),
            self.search.clone(),
            self.fetch.clone(),
        )
        .map_session(|s| self.prepare(s))
    }

    fn evaluator(&self) -> Evaluator {
        Evaluator::from_config(&self.config, self.provider.clone()).map_session(|s| self.prepare(s))
    }

    /// Research one query, evaluate the report, and save the result.
    pub async fn run(&self, query: &str) -> Result<PipelineResult> {
        match self.run_inner(query).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if let Some(events) = &self.events {
                    events.publish(DomainEvent::TaskFailed {
                        task_id: query.to_string(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, query: &str) -> Result<PipelineResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        let research = self.research_loop().process(query).await?;

        let evaluation = if !self.config.research.evaluate {
            None
        } else if research.report.trim().is_empty() {
            warn!(query, "Empty report, skipping evaluation");
            None
        } else {
            let evaluation = self
                .evaluator()
                .evaluate(query, &research.report, &research.findings)
                .await?;
            Some(evaluation)
        };

        let mut result = PipelineResult {
            query: query.to_string(),
            metadata: RunMetadata {
                duration_secs: start.elapsed().as_secs_f64(),
                started_at,
                finished_at: Utc::now(),
                max_iterations: research.max_iterations,
                iterations_used: research.iterations_used,
                done: research.done,
                saved_to: None,
            },
            research,
            evaluation,
        };

        if let Some(store) = &self.store {
            match store.store(&result, None) {
                Ok(path) => {
                    info!(path = %path.display(), "Research result saved");
                    result.metadata.saved_to = Some(path);
                }
                Err(e) => warn!(error = %e, "Failed to save research result"),
            }
        }

        info!(
            query,
            duration_secs = result.metadata.duration_secs,
            iterations = result.metadata.iterations_used,
            "Pipeline run finished"
        );
        Ok(result)
    }

    /// Run every query with at most `runtime.max_concurrent_requests` in
    /// flight. Results keep input order; failed queries are dropped.
    pub async fn run_batch(&self, queries: &[String]) -> Vec<PipelineResult> {
        let limit = self.config.runtime.max_concurrent_requests.max(1);
        info!(queries = queries.len(), concurrency = limit, "Batch started");

        let results: Vec<PipelineResult> = futures::stream::iter(queries.iter().enumerate())
            .map(|(index, query)| async move { (index, query, self.run(query).await) })
            .buffered(limit)
            .filter_map(|(index, query, outcome)| async move {
                match outcome {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!(index, query = %query, error = %e, "Batch query failed, skipping");
                        None
                    }
                }
            })
            .collect()
            .await;

        info!(
            succeeded = results.len(),
            failed = queries.len() - results.len(),
            "Batch finished"
        );
        results
    }
}
