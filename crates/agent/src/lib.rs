//! Agent loops for Sleuth.
//!
//! Two loop variants share one driver ([`engine::drive`]):
//!
//! 1. **Research**: generate sub-queries, search, read and judge each new
//!    source, check completeness, then compile a report.
//! 2. **Code**: ask for Python, run it in a sandbox, feed the output back,
//!    stop at a final answer.
//!
//! The [`Evaluator`] scores a finished research report. Every agent owns
//! its [`ModelSession`], so concurrent instances never share a transcript.

pub mod code;
pub mod engine;
pub mod evaluator;
pub mod parse;
pub mod prompts;
pub mod research;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use code::{CodeLoop, CodeOutcome, CodeStep};
pub use engine::{AgentLoop, LoopOutcome, LoopStrategy, drive};
pub use evaluator::{EvaluationRequest, Evaluator};
pub use research::{IterationState, ResearchLoop, ResearchOutcome, ResearchSettings};
pub use session::{Agent, ModelSession, Reply};
