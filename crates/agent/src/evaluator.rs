//! Evaluator — scores a research report aspect by aspect, then overall.
//!
//! All calls share one growing transcript, so the aggregate assessment
//! sees every aspect discussion that came before it.

use crate::parse::{DEFAULT_SCORE, extract_score, extract_verdict, find_score, format_findings};
use crate::prompts::{AggregatePrompt, AspectPrompt, EVALUATOR_SYSTEM_PROMPT, PromptTemplate};
use crate::session::{Agent, ModelSession};
use async_trait::async_trait;
use sleuth_config::AppConfig;
use sleuth_core::error::Result;
use sleuth_core::evaluation::{Aspect, AspectEvaluation, Evaluation, OverallAssessment};
use sleuth_core::finding::Finding;
use sleuth_core::provider::Provider;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};

pub const DEFAULT_EVALUATOR_TEMPERATURE: f32 = 0.2;

/// Everything the evaluator looks at.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub query: String,
    pub report: String,
    pub findings: Vec<Finding>,
}

pub struct Evaluator {
    session: ModelSession,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            session: ModelSession::new(provider, model, EVALUATOR_SYSTEM_PROMPT)
                .with_temperature(DEFAULT_EVALUATOR_TEMPERATURE),
        }
    }

    /// Uses `evaluator.model` when set, else the default model.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Self {
        Self::new(provider, config.evaluator_model()).map_session(|s| {
            s.with_temperature(config.evaluator.temperature)
                .with_max_tokens(Some(config.default_max_tokens))
        })
    }

    pub fn map_session(mut self, f: impl FnOnce(ModelSession) -> ModelSession) -> Self {
        self.session = f(self.session);
        self
    }

    /// Convenience over [`Agent::process`].
    pub async fn evaluate(
        &mut self,
        query: &str,
        report: &str,
        findings: &[Finding],
    ) -> Result<Evaluation> {
        self.process(&EvaluationRequest {
            query: query.to_string(),
            report: report.to_string(),
            findings: findings.to_vec(),
        })
        .await
    }

    async fn evaluate_aspect(
        &mut self,
        aspect: Aspect,
        request: &EvaluationRequest,
        findings: &str,
    ) -> Result<AspectEvaluation> {
        let prompt = AspectPrompt::new(aspect, &request.query, &request.report, findings)?;
        let reply = self.session.ask(prompt.render()).await?;

        let score = if reply.is_failed() {
            DEFAULT_SCORE
        } else {
            extract_score(reply.text())
        };
        debug!(aspect = %aspect, score, "Aspect evaluated");

        Ok(AspectEvaluation {
            aspect,
            score,
            explanation: reply.text().to_string(),
        })
    }

    async fn assess(&mut self, aspects: &[AspectEvaluation]) -> Result<OverallAssessment> {
        let reply = self.session.ask(AggregatePrompt::new(aspects)?.render()).await?;
        let text = reply.text();

        let extracted = if reply.is_failed() { None } else { find_score(text) };
        let score = extracted.map(f64::from).unwrap_or_else(|| mean_score(aspects));

        Ok(OverallAssessment {
            score,
            verdict: extract_verdict(text),
            narrative: text.to_string(),
        })
    }
}

/// Mean of the aspect scores, 5 when there are none.
fn mean_score(aspects: &[AspectEvaluation]) -> f64 {
    if aspects.is_empty() {
        return f64::from(DEFAULT_SCORE);
    }
    let total: u32 = aspects.iter().map(|a| u32::from(a.score)).sum();
    f64::from(total) / aspects.len() as f64
}

#[async_trait]
impl Agent for Evaluator {
    type Input = EvaluationRequest;
    type Output = Evaluation;

    fn session(&self) -> &ModelSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut ModelSession {
        &mut self.session
    }

    async fn process(&mut self, request: &EvaluationRequest) -> Result<Evaluation> {
        let task_id = self.session.begin_task();
        let span = info_span!("evaluate", task_id = %task_id);

        async {
            let findings = format_findings(&request.findings);
            let mut aspects = Vec::with_capacity(Aspect::ALL.len());
            for aspect in Aspect::ALL {
                aspects.push(self.evaluate_aspect(aspect, request, &findings).await?);
            }
            let overall = self.assess(&aspects).await?;

            info!(
                score = overall.score,
                verdict = %overall.verdict,
                "Evaluation finished"
            );
            Ok(Evaluation { aspects, overall })
        }
        .instrument(span)
        .await
    }
}
