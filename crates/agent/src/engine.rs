//! Loop engine — the shared plan / act / observe driver.
//!
//! ```text
//! ┌──────────────┐
//! │  begin(task) │  reset context, append task
//! └──────┬───────┘
//!        │
//!   ┌────▼─────┐     ┌──────────┐     ┌───────────┐     ┌─────────────┐
//!   │   plan   │────▶│   act    │────▶│  observe  │────▶│ should_stop │
//!   │ (model)  │     │ (action) │     │ (context) │     │             │
//!   └──────────┘     └──────────┘     └───────────┘     └──────┬──────┘
//!        ▲                                                     │ no, budget left
//!        └─────────────────────────────────────────────────────┘
//! ```
//!
//! Running out of rounds is not an error: `finish` still produces an
//! outcome, marked `done = false`.

use crate::code::{CodeLoop, CodeOutcome};
use crate::research::{ResearchLoop, ResearchOutcome};
use crate::session::{Agent, ModelSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sleuth_core::error::Result;
use tracing::debug;

/// One loop variant's behaviour inside the shared driver.
#[async_trait]
pub trait LoopStrategy: Send + Sized {
    type Action: Send;
    type Observation: Send;
    type Output: Send;

    /// Round budget.
    fn budget(&self) -> usize;

    /// Seed the freshly reset context with the task.
    fn begin(&mut self, session: &mut ModelSession, task: &str) -> Result<()>;

    /// Ask the model for the next action.
    async fn plan(&mut self, session: &mut ModelSession, round: usize) -> Result<Self::Action>;

    /// Carry the action out.
    async fn act(
        &mut self,
        session: &mut ModelSession,
        action: Self::Action,
    ) -> Result<Self::Observation>;

    /// Record the observation and feed it back into the context.
    async fn observe(
        &mut self,
        session: &mut ModelSession,
        round: usize,
        observation: Self::Observation,
    ) -> Result<()>;

    /// Termination predicate, checked after every round.
    async fn should_stop(&mut self, session: &mut ModelSession, round: usize) -> Result<bool>;

    async fn finish(
        self,
        session: &mut ModelSession,
        rounds_used: usize,
        done: bool,
    ) -> Result<Self::Output>;
}

/// Drive `strategy` until its predicate holds or its budget runs out.
pub async fn drive<S: LoopStrategy>(
    mut strategy: S,
    session: &mut ModelSession,
    task: &str,
) -> Result<S::Output> {
    session.reset();
    strategy.begin(session, task)?;

    let budget = strategy.budget();
    let mut rounds_used = 0;
    let mut done = false;

    while rounds_used < budget {
        let round = rounds_used;
        debug!(round = round + 1, budget, "Starting round");

        let action = strategy.plan(session, round).await?;
        let observation = strategy.act(session, action).await?;
        strategy.observe(session, round, observation).await?;
        rounds_used += 1;

        if strategy.should_stop(session, round).await? {
            done = true;
            break;
        }
    }

    strategy.finish(session, rounds_used, done).await
}

/// The two loop variants behind one entry point.
pub enum AgentLoop {
    Research(ResearchLoop),
    Code(CodeLoop),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopOutcome {
    Research(ResearchOutcome),
    Code(CodeOutcome),
}

impl LoopOutcome {
    pub fn done(&self) -> bool {
        match self {
            Self::Research(r) => r.done,
            Self::Code(c) => c.done,
        }
    }

    pub fn rounds_used(&self) -> usize {
        match self {
            Self::Research(r) => r.iterations_used,
            Self::Code(c) => c.steps_used,
        }
    }
}

impl AgentLoop {
    pub async fn run(&mut self, task: &str) -> Result<LoopOutcome> {
        match self {
            Self::Research(agent) => agent.process(task).await.map(LoopOutcome::Research),
            Self::Code(agent) => agent.process(task).await.map(LoopOutcome::Code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use sleuth_core::message::Role;
    use std::sync::Arc;

    /// Counts rounds and stops once `stop_after` rounds have run.
    struct Counter {
        budget: usize,
        stop_after: Option<usize>,
        observed: Vec<String>,
    }

    #[async_trait]
    impl LoopStrategy for Counter {
        type Action = String;
        type Observation = String;
        type Output = (Vec<String>, usize, bool);

        fn budget(&self) -> usize {
            self.budget
        }

        fn begin(&mut self, session: &mut ModelSession, task: &str) -> Result<()> {
            session.push(Role::User, task);
            Ok(())
        }

        async fn plan(&mut self, session: &mut ModelSession, _round: usize) -> Result<String> {
            Ok(session.respond().await?.text().to_string())
        }

        async fn act(&mut self, _session: &mut ModelSession, action: String) -> Result<String> {
            Ok(action.to_uppercase())
        }

        async fn observe(
            &mut self,
            session: &mut ModelSession,
            _round: usize,
            observation: String,
        ) -> Result<()> {
            session.push(Role::User, observation.clone());
            self.observed.push(observation);
            Ok(())
        }

        async fn should_stop(&mut self, _session: &mut ModelSession, round: usize) -> Result<bool> {
            Ok(self.stop_after == Some(round + 1))
        }

        async fn finish(
            self,
            _session: &mut ModelSession,
            rounds_used: usize,
            done: bool,
        ) -> Result<Self::Output> {
            Ok((self.observed, rounds_used, done))
        }
    }

    fn session(replies: &[&str]) -> ModelSession {
        ModelSession::new(
            Arc::new(SequentialMockProvider::texts(replies)),
            "mock",
            "sys",
        )
    }

    #[tokio::test]
    async fn stops_when_predicate_holds() {
        let mut session = session(&["a", "b", "c"]);
        let strategy = Counter {
            budget: 5,
            stop_after: Some(2),
            observed: Vec::new(),
        };

        let (observed, rounds, done) = drive(strategy, &mut session, "task").await.unwrap();
        assert_eq!(observed, vec!["A", "B"]);
        assert_eq!(rounds, 2);
        assert!(done);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_not_an_error() {
        let mut session = session(&["a", "b", "c"]);
        let strategy = Counter {
            budget: 3,
            stop_after: None,
            observed: Vec::new(),
        };

        let (observed, rounds, done) = drive(strategy, &mut session, "task").await.unwrap();
        assert_eq!(observed.len(), 3);
        assert_eq!(rounds, 3);
        assert!(!done);
    }

    #[tokio::test]
    async fn zero_budget_runs_no_rounds() {
        let mut session = session(&[]);
        let strategy = Counter {
            budget: 0,
            stop_after: None,
            observed: Vec::new(),
        };

        let (_, rounds, done) = drive(strategy, &mut session, "task").await.unwrap();
        assert_eq!(rounds, 0);
        assert!(!done);
    }

    #[tokio::test]
    async fn context_is_reset_before_each_run() {
        let mut session = session(&["a", "b"]);
        session.push(Role::User, "stale message from a previous run");

        let strategy = Counter {
            budget: 1,
            stop_after: None,
            observed: Vec::new(),
        };
        drive(strategy, &mut session, "task").await.unwrap();

        let contents: Vec<&str> = session
            .context()
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["sys", "task", "a", "A"]);
    }
}
