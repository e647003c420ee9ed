//! Code loop — write Python, run it, read the output, repeat.
//!
//! Every reply is requested with the stop sequence `Observation:` so the
//! model cannot invent its own execution results.

use crate::engine::{LoopStrategy, drive};
use crate::parse::{NO_CODE_OBSERVATION, detect_final_answer, extract_code_blocks};
use crate::prompts::{CODE_SYSTEM_PROMPT, CodeTaskPrompt, ObservationPrompt, PromptTemplate};
use crate::session::{Agent, ModelSession};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sleuth_config::AppConfig;
use sleuth_core::error::Result;
use sleuth_core::event::DomainEvent;
use sleuth_core::message::Role;
use sleuth_core::provider::Provider;
use sleuth_core::sandbox::CodeSandbox;
use sleuth_core::text::preview;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

pub const OBSERVATION_STOP: &str = "Observation:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeStep {
    pub step_index: usize,
    /// Raw model reply.
    pub generated_text: String,
    /// Code that was sent to the sandbox, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_code: Option<String>,
    pub observation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeOutcome {
    pub task: String,
    pub answer: Option<String>,
    pub steps: Vec<CodeStep>,
    pub steps_used: usize,
    pub max_steps: usize,
    pub done: bool,
}

/// A code-executing agent. Each `process` call is an independent run.
pub struct CodeLoop {
    session: ModelSession,
    sandbox: Arc<dyn CodeSandbox>,
    max_steps: usize,
}

impl CodeLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        sandbox: Arc<dyn CodeSandbox>,
    ) -> Self {
        Self {
            session: ModelSession::new(provider, model, CODE_SYSTEM_PROMPT)
                .with_stop(vec![OBSERVATION_STOP.to_string()]),
            sandbox,
            max_steps: 6,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        sandbox: Arc<dyn CodeSandbox>,
    ) -> Self {
        Self::new(provider, &config.default_model, sandbox)
            .with_max_steps(config.code.max_steps)
            .map_session(|s| {
                s.with_temperature(config.default_temperature)
                    .with_max_tokens(Some(config.default_max_tokens))
            })
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Adjust the underlying session. The stop sequence is kept.
    pub fn map_session(mut self, f: impl FnOnce(ModelSession) -> ModelSession) -> Self {
        self.session = f(self.session).with_stop(vec![OBSERVATION_STOP.to_string()]);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }
}

#[async_trait]
impl Agent for CodeLoop {
    type Input = str;
    type Output = CodeOutcome;

    fn session(&self) -> &ModelSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut ModelSession {
        &mut self.session
    }

    async fn process(&mut self, task: &str) -> Result<CodeOutcome> {
        let task_id = self.session.begin_task();
        let span = info_span!("code", task_id = %task_id);
        let started = Instant::now();
        let max_steps = self.max_steps;

        let strategy = CodeStrategy {
            sandbox: self.sandbox.clone(),
            max_steps,
            task: task.to_string(),
            steps: Vec::new(),
            answer: None,
        };

        let outcome = async {
            info!(max_steps, task = %preview(task, 80), "Code task started");
            let outcome = drive(strategy, &mut self.session, task).await?;
            info!(steps = outcome.steps_used, done = outcome.done, "Code task finished");
            Ok::<_, sleuth_core::Error>(outcome)
        }
        .instrument(span)
        .await?;

        self.session.publish(DomainEvent::TaskCompleted {
            task_id,
            rounds_used: outcome.steps_used,
            done: outcome.done,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }
}

/// What the model asked for in one step.
struct CodeAction {
    generated_text: String,
    code: Option<String>,
    /// The model call itself failed; `generated_text` holds the error.
    failed: bool,
}

struct StepResult {
    action: CodeAction,
    observation: String,
}

struct CodeStrategy {
    sandbox: Arc<dyn CodeSandbox>,
    max_steps: usize,
    task: String,
    steps: Vec<CodeStep>,
    answer: Option<String>,
}

impl CodeStrategy {
    /// Fenced `py` blocks first, then the whole reply if it parses as Python.
    async fn extract(&self, reply: &str) -> Option<String> {
        if let Some(code) = extract_code_blocks(reply) {
            return Some(code);
        }
        let raw = reply.trim();
        if raw.is_empty() {
            return None;
        }
        match self.sandbox.check_syntax(raw).await {
            Ok(()) => Some(raw.to_string()),
            Err(reason) => {
                debug!(%reason, "Reply is neither fenced nor valid Python");
                None
            }
        }
    }
}

#[async_trait]
impl LoopStrategy for CodeStrategy {
    type Action = CodeAction;
    type Observation = StepResult;
    type Output = CodeOutcome;

    fn budget(&self) -> usize {
        self.max_steps
    }

    fn begin(&mut self, session: &mut ModelSession, task: &str) -> Result<()> {
        session.push(Role::User, CodeTaskPrompt::new(task)?.render());
        Ok(())
    }

    async fn plan(&mut self, session: &mut ModelSession, round: usize) -> Result<CodeAction> {
        debug!(step = round + 1, max_steps = self.max_steps, "Code step");
        let reply = session.respond().await?;
        if reply.is_failed() {
            return Ok(CodeAction {
                generated_text: reply.text().to_string(),
                code: None,
                failed: true,
            });
        }

        let generated_text = reply.text().to_string();
        let code = self.extract(&generated_text).await;
        Ok(CodeAction {
            generated_text,
            code,
            failed: false,
        })
    }

    async fn act(&mut self, session: &mut ModelSession, action: CodeAction) -> Result<StepResult> {
        if action.failed {
            let observation = action.generated_text.clone();
            return Ok(StepResult {
                action,
                observation,
            });
        }

        let Some(code) = action.code.as_deref() else {
            return Ok(StepResult {
                action,
                observation: NO_CODE_OBSERVATION.to_string(),
            });
        };

        session.ensure_active()?;
        let observation = match self.sandbox.execute(code).await {
            Ok(output) => output.observation(),
            Err(e) => {
                warn!(error = %e, "Sandbox could not run code");
                format!("Error: {e}")
            }
        };

        Ok(StepResult {
            action,
            observation,
        })
    }

    async fn observe(
        &mut self,
        session: &mut ModelSession,
        round: usize,
        result: StepResult,
    ) -> Result<()> {
        session.push(Role::User, ObservationPrompt::new(&result.observation).render());

        let final_answer = detect_final_answer(&result.observation);

        session.publish(DomainEvent::StepExecuted {
            task_id: session.task_id().to_string(),
            step: round + 1,
            observation_preview: preview(&result.observation, 120),
            timestamp: Utc::now(),
        });
        debug!(
            step = round + 1,
            observation = %preview(&result.observation, 120),
            answered = final_answer.is_some(),
            "Observation recorded"
        );

        if final_answer.is_some() {
            self.answer = final_answer.clone();
        }
        self.steps.push(CodeStep {
            step_index: round,
            generated_text: result.action.generated_text,
            extracted_code: result.action.code,
            observation: result.observation,
            final_answer,
        });
        Ok(())
    }

    async fn should_stop(&mut self, _session: &mut ModelSession, _round: usize) -> Result<bool> {
        Ok(self.answer.is_some())
    }

    async fn finish(
        self,
        _session: &mut ModelSession,
        steps_used: usize,
        done: bool,
    ) -> Result<CodeOutcome> {
        Ok(CodeOutcome {
            task: self.task,
            answer: self.answer,
            steps: self.steps,
            steps_used,
            max_steps: self.max_steps,
            done,
        })
    }
}
