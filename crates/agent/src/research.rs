//! Research loop — sub-queries, search, read, judge, repeat, report.

use crate::engine::{LoopStrategy, drive};
use crate::parse::{format_findings, is_complete, is_useful, parse_sub_queries};
use crate::prompts::{
    CompletenessPrompt, PromptTemplate, RESEARCH_SYSTEM_PROMPT, ReportPrompt, ResearchTask,
    SourcePrompt, SubQueryPrompt,
};
use crate::session::{Agent, ModelSession};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sleuth_config::AppConfig;
use sleuth_core::error::Result;
use sleuth_core::event::DomainEvent;
use sleuth_core::finding::{Finding, VisitedSet};
use sleuth_core::message::Role;
use sleuth_core::provider::Provider;
use sleuth_core::search::{FetchProvider, FetchedPage, SearchHit, SearchProvider};
use sleuth_core::text::preview;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};

/// Budgets and limits for one research run.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub max_iterations: usize,
    pub max_sub_queries: usize,
    pub max_results: usize,
    pub fetch_timeout: Duration,
    pub content_char_limit: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_sub_queries: 4,
            max_results: 10,
            fetch_timeout: Duration::from_secs(30),
            content_char_limit: 5000,
        }
    }
}

impl ResearchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let research = &config.research;
        Self {
            max_iterations: research.max_iterations,
            max_sub_queries: research.max_sub_queries,
            max_results: research.max_results,
            fetch_timeout: Duration::from_secs(research.fetch_timeout_secs),
            content_char_limit: research.content_char_limit,
        }
    }
}

/// What happened in one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationState {
    pub iteration_index: usize,
    pub sub_queries: Vec<String>,
    /// Findings gathered in this iteration.
    pub findings: Vec<Finding>,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub query: String,
    pub report: String,
    pub findings: Vec<Finding>,
    pub iterations: Vec<IterationState>,
    pub iterations_used: usize,
    pub max_iterations: usize,
    pub done: bool,
    pub sources_visited: VisitedSet,
}

/// A research agent. Each `process` call is an independent run.
pub struct ResearchLoop {
    session: ModelSession,
    search: Arc<dyn SearchProvider>,
    fetch: Arc<dyn FetchProvider>,
    settings: ResearchSettings,
}

impl ResearchLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        search: Arc<dyn SearchProvider>,
        fetch: Arc<dyn FetchProvider>,
    ) -> Self {
        Self {
            session: ModelSession::new(provider, model, RESEARCH_SYSTEM_PROMPT),
            search,
            fetch,
            settings: ResearchSettings::default(),
        }
    }

    /// Model, temperature, token cap and budgets taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        search: Arc<dyn SearchProvider>,
        fetch: Arc<dyn FetchProvider>,
    ) -> Self {
        Self::new(provider, &config.default_model, search, fetch)
            .with_settings(ResearchSettings::from_config(config))
            .map_session(|s| {
                s.with_temperature(config.default_temperature)
                    .with_max_tokens(Some(config.default_max_tokens))
            })
    }

    pub fn with_settings(mut self, settings: ResearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.settings.max_iterations = max_iterations;
        self
    }

    /// Adjust the underlying session (events, cancellation, sampling).
    pub fn map_session(mut self, f: impl FnOnce(ModelSession) -> ModelSession) -> Self {
        self.session = f(self.session);
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }
}

#[async_trait]
impl Agent for ResearchLoop {
    type Input = str;
    type Output = ResearchOutcome;

    fn session(&self) -> &ModelSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut ModelSession {
        &mut self.session
    }

    async fn process(&mut self, query: &str) -> Result<ResearchOutcome> {
        let task_id = self.session.begin_task();
        let span = info_span!("research", task_id = %task_id, query = %preview(query, 80));
        let started = Instant::now();
        let max_iterations = self.settings.max_iterations;

        let strategy = ResearchStrategy {
            search: self.search.clone(),
            fetch: self.fetch.clone(),
            settings: self.settings.clone(),
            query: query.to_string(),
            visited: VisitedSet::new(),
            findings: Vec::new(),
            iterations: Vec::new(),
        };

        let outcome = async {
            info!(max_iterations, "Research started");
            let outcome = drive(strategy, &mut self.session, query).await?;
            info!(
                iterations = outcome.iterations_used,
                findings = outcome.findings.len(),
                sources = outcome.sources_visited.len(),
                done = outcome.done,
                "Research finished"
            );
            Ok::<_, sleuth_core::Error>(outcome)
        }
        .instrument(span)
        .await?;

        self.session.publish(DomainEvent::TaskCompleted {
            task_id,
            rounds_used: outcome.iterations_used,
            done: outcome.done,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }
}

/// Per-run state: nothing here outlives one `process` call.
struct ResearchStrategy {
    search: Arc<dyn SearchProvider>,
    fetch: Arc<dyn FetchProvider>,
    settings: ResearchSettings,
    query: String,
    visited: VisitedSet,
    findings: Vec<Finding>,
    iterations: Vec<IterationState>,
}

impl ResearchStrategy {
    /// Fetch a page, falling back to the hit's snippet.
    async fn read(&self, hit: &SearchHit) -> String {
        let limit = self.settings.content_char_limit;
        match self.fetch.fetch(&hit.url, self.settings.fetch_timeout).await {
            Ok(page) => {
                let content = page.content(limit);
                if content.is_empty() {
                    FetchedPage::from_snippet(hit).content(limit)
                } else {
                    content
                }
            }
            Err(e) => {
                warn!(url = %hit.url, error = %e, "Fetch failed, using search snippet");
                FetchedPage::from_snippet(hit).content(limit)
            }
        }
    }

    /// Summarize one source; `None` when it is judged not useful.
    async fn process_source(
        &self,
        session: &mut ModelSession,
        hit: &SearchHit,
    ) -> Result<Option<Finding>> {
        session.ensure_active()?;
        let content = self.read(hit).await;

        let prompt = SourcePrompt::new(&hit.url, &content)?;
        let reply = session.ask(prompt.render()).await?;
        let useful = !reply.is_failed() && is_useful(reply.text());

        session.publish(DomainEvent::SourceProcessed {
            task_id: session.task_id().to_string(),
            url: hit.url.clone(),
            useful,
            timestamp: Utc::now(),
        });
        debug!(url = %hit.url, useful, "Source processed");

        Ok(useful.then(|| Finding {
            url: hit.url.clone(),
            title: hit.title.clone(),
            summary: reply.text().to_string(),
            is_useful: true,
        }))
    }
}

#[async_trait]
impl LoopStrategy for ResearchStrategy {
    type Action = Vec<String>;
    type Observation = Vec<Finding>;
    type Output = ResearchOutcome;

    fn budget(&self) -> usize {
        self.settings.max_iterations
    }

    fn begin(&mut self, session: &mut ModelSession, task: &str) -> Result<()> {
        session.push(Role::User, ResearchTask::new(task)?.render());
        Ok(())
    }

    async fn plan(&mut self, session: &mut ModelSession, round: usize) -> Result<Vec<String>> {
        info!(
            iteration = round + 1,
            max_iterations = self.settings.max_iterations,
            "Research iteration"
        );
        let prompt = SubQueryPrompt::new(&self.query, self.settings.max_sub_queries)?;
        let reply = session.ask(prompt.render()).await?;
        let queries = parse_sub_queries(reply.text(), &self.query, self.settings.max_sub_queries);
        debug!(?queries, "Sub-queries");
        Ok(queries)
    }

    async fn act(
        &mut self,
        session: &mut ModelSession,
        queries: Vec<String>,
    ) -> Result<Vec<Finding>> {
        let mut new_findings = Vec::new();

        for query in &queries {
            session.ensure_active()?;
            let mut hits = self.search.search(query, self.settings.max_results).await?;
            hits.truncate(self.settings.max_results);
            debug!(query = %query, hits = hits.len(), "Search complete");

            for hit in &hits {
                if !self.visited.insert(&hit.url) {
                    continue;
                }
                if let Some(finding) = self.process_source(session, hit).await? {
                    new_findings.push(finding);
                }
            }
        }

        self.iterations.push(IterationState {
            iteration_index: self.iterations.len(),
            sub_queries: queries,
            findings: new_findings.clone(),
            done: false,
        });
        Ok(new_findings)
    }

    async fn observe(
        &mut self,
        _session: &mut ModelSession,
        _round: usize,
        findings: Vec<Finding>,
    ) -> Result<()> {
        // Source summaries are already in the transcript.
        self.findings.extend(findings);
        Ok(())
    }

    async fn should_stop(&mut self, session: &mut ModelSession, round: usize) -> Result<bool> {
        let complete = if self.findings.is_empty() {
            false
        } else {
            let summary = format_findings(&self.findings);
            let reply = session.ask(CompletenessPrompt::new(&summary)?.render()).await?;
            is_complete(reply.text())
        };

        if let Some(state) = self.iterations.last_mut() {
            state.done = complete;
        }
        session.publish(DomainEvent::IterationCompleted {
            task_id: session.task_id().to_string(),
            iteration: round + 1,
            findings: self.findings.len(),
            complete,
            timestamp: Utc::now(),
        });

        Ok(complete)
    }

    async fn finish(
        self,
        session: &mut ModelSession,
        iterations_used: usize,
        done: bool,
    ) -> Result<ResearchOutcome> {
        let summary = format_findings(&self.findings);
        let reply = session.ask(ReportPrompt::new(&self.query, &summary)?.render()).await?;

        Ok(ResearchOutcome {
            query: self.query,
            report: reply.text().to_string(),
            findings: self.findings,
            iterations: self.iterations,
            iterations_used,
            max_iterations: self.settings.max_iterations,
            done,
            sources_visited: self.visited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockFetch, MockSearch, SequentialMockProvider};
    use sleuth_core::error::{Error, ProviderError, SearchError};
    use sleuth_core::event::EventBus;

    fn research(
        provider: Arc<SequentialMockProvider>,
        search: Arc<MockSearch>,
        fetch: Arc<MockFetch>,
        max_iterations: usize,
    ) -> ResearchLoop {
        ResearchLoop::new(provider, "mock", search, fetch).with_max_iterations(max_iterations)
    }

    #[tokio::test]
    async fn complete_after_first_iteration() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"["q1"]"#,
            "Useful summary of page 0",
            "Useful summary of page 1",
            "COMPLETE",
            "Final report",
        ]));
        let search = Arc::new(MockSearch::per_query(2));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider.clone(), search, fetch.clone(), 3);
        let outcome = agent.process("what is rust").await.unwrap();

        assert!(outcome.done);
        assert_eq!(outcome.iterations_used, 1);
        assert_eq!(outcome.report, "Final report");
        assert_eq!(outcome.findings.len(), 2);
        assert_eq!(outcome.sources_visited.len(), 2);
        assert_eq!(fetch.fetched().len(), 2);
        assert_eq!(provider.call_count(), 5);
    }

    #[tokio::test]
    async fn incomplete_continues_until_budget() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"["q1"]"#,
            "summary a",
            "INCOMPLETE: need more",
            r#"["q2"]"#,
            "summary b",
            "INCOMPLETE: still missing",
            "Report",
        ]));
        let search = Arc::new(MockSearch::per_query(1));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider.clone(), search, fetch, 2);
        let outcome = agent.process("topic").await.unwrap();

        assert!(!outcome.done);
        assert_eq!(outcome.iterations_used, 2);
        assert!(outcome.iterations_used <= outcome.max_iterations);
        assert_eq!(outcome.findings.len(), 2);
        assert_eq!(outcome.iterations.len(), 2);
        assert!(outcome.iterations.iter().all(|i| !i.done));
        assert_eq!(outcome.iterations[0].findings.len(), 1);
        assert_eq!(outcome.iterations[0].findings[0].summary, "summary a");
        assert_eq!(outcome.iterations[1].findings[0].summary, "summary b");
    }

    #[tokio::test]
    async fn visited_urls_are_processed_once() {
        // Every sub-query returns the same two URLs.
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"["a", "b"]"#,
            "summary 0",
            "summary 1",
            "INCOMPLETE: more",
            r#"["c"]"#,
            "COMPLETE",
            "Report",
        ]));
        let search = Arc::new(MockSearch::fixed(&["https://x.test/0", "https://x.test/1"]));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider, search, fetch.clone(), 5);
        let outcome = agent.process("topic").await.unwrap();

        assert_eq!(fetch.fetched(), vec!["https://x.test/0", "https://x.test/1"]);
        assert_eq!(outcome.sources_visited.len(), 2);
        assert_eq!(outcome.iterations_used, 2);
        assert!(outcome.done);
    }

    #[tokio::test]
    async fn not_useful_sources_are_dropped() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"["q"]"#,
            "This page is not useful.",
            "Report",
        ]));
        let search = Arc::new(MockSearch::per_query(1));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider.clone(), search, fetch, 1);
        let outcome = agent.process("topic").await.unwrap();

        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.sources_visited.len(), 1);
        // No findings: completeness is not asked.
        assert_eq!(provider.call_count(), 3);
        assert!(!outcome.done);
    }

    #[tokio::test]
    async fn fetch_failure_uses_snippet() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"["q"]"#,
            "summary",
            "COMPLETE",
            "Report",
        ]));
        let search = Arc::new(MockSearch::per_query(1));
        let fetch = Arc::new(MockFetch::failing());

        let mut agent = research(provider.clone(), search, fetch, 2);
        let outcome = agent.process("topic").await.unwrap();

        assert_eq!(outcome.findings.len(), 1);
        let requests = provider.requests();
        let source_prompt = &requests[1].messages.last().unwrap().content;
        assert!(source_prompt.contains("snippet for q #0"));
    }

    #[tokio::test]
    async fn page_content_is_limited() {
        let provider = Arc::new(SequentialMockProvider::texts(&[r#"["q"]"#, "summary", "COMPLETE", "Report"]));
        let search = Arc::new(MockSearch::per_query(1));
        let fetch = Arc::new(MockFetch::with_text(&"x".repeat(10_000)));

        let mut agent = research(provider.clone(), search, fetch, 1).with_settings(ResearchSettings {
            max_iterations: 1,
            content_char_limit: 100,
            ..ResearchSettings::default()
        });
        agent.process("topic").await.unwrap();

        let requests = provider.requests();
        let source_prompt = &requests[1].messages.last().unwrap().content;
        assert!(source_prompt.contains(&"x".repeat(100)));
        assert!(!source_prompt.contains(&"x".repeat(101)));
    }

    #[tokio::test]
    async fn bad_sub_query_reply_falls_back_to_task() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "I cannot produce JSON today",
            "summary",
            "COMPLETE",
            "Report",
        ]));
        let search = Arc::new(MockSearch::per_query(1));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider, search.clone(), fetch, 1);
        agent.process("the original task").await.unwrap();
        assert_eq!(search.queries(), vec!["the original task"]);
    }

    #[tokio::test]
    async fn transient_model_failure_skips_source() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(r#"["q"]"#.into()),
            Err(ProviderError::Network("reset".into())),
            Ok("summary of second".into()),
            Ok("COMPLETE".into()),
            Ok("Report".into()),
        ]));
        let search = Arc::new(MockSearch::per_query(2));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider, search, fetch, 1);
        let outcome = agent.process("topic").await.unwrap();

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].summary, "summary of second");
        assert_eq!(outcome.sources_visited.len(), 2);
    }

    #[tokio::test]
    async fn fatal_model_failure_aborts() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let mut agent = research(
            provider,
            Arc::new(MockSearch::per_query(1)),
            Arc::new(MockFetch::ok()),
            3,
        );
        let err = agent.process("topic").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let provider = Arc::new(SequentialMockProvider::texts(&[r#"["q"]"#]));
        let search = Arc::new(MockSearch::failing());
        let mut agent = research(provider, search, Arc::new(MockFetch::ok()), 3);

        let err = agent.process("topic").await.unwrap_err();
        assert!(matches!(err, Error::Search(SearchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let mut agent = research(
            provider,
            Arc::new(MockSearch::per_query(1)),
            Arc::new(MockFetch::ok()),
            3,
        );
        assert!(matches!(agent.process("  ").await, Err(Error::Prompt(_))));
    }

    #[tokio::test]
    async fn runs_are_independent() {
        let replies = [r#"["q"]"#, "summary", "COMPLETE", "Report"];
        let mut script = replies.to_vec();
        script.extend(replies);
        let provider = Arc::new(SequentialMockProvider::texts(&script));
        let fetch = Arc::new(MockFetch::ok());

        let mut agent = research(provider, Arc::new(MockSearch::per_query(1)), fetch.clone(), 2);
        let first = agent.process("topic").await.unwrap();
        let second = agent.process("topic").await.unwrap();

        // The second run re-reads the same URL: visited state is per run.
        assert_eq!(fetch.fetched().len(), 2);
        assert_eq!(first.findings, second.findings);
        assert_eq!(agent.session().context().messages()[1].content, "Research query: topic");
    }

    #[tokio::test]
    async fn events_are_published() {
        let provider = Arc::new(SequentialMockProvider::texts(&[r#"["q"]"#, "summary", "COMPLETE", "Report"]));
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();

        let mut agent = research(
            provider,
            Arc::new(MockSearch::per_query(1)),
            Arc::new(MockFetch::ok()),
            2,
        )
        .map_session(|s| s.with_events(bus.clone()));
        agent.process("topic").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::ModelInvoked { .. } => "model",
                DomainEvent::SourceProcessed { .. } => "source",
                DomainEvent::IterationCompleted { .. } => "iteration",
                DomainEvent::TaskCompleted { .. } => "completed",
                _ => "other",
            });
        }
        assert_eq!(
            kinds,
            vec!["model", "model", "source", "model", "iteration", "model", "completed"]
        );
    }
}
