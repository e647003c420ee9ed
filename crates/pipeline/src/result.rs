//! Pipeline result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_agent::ResearchOutcome;
use sleuth_core::evaluation::Evaluation;
use std::path::PathBuf;

/// One query's complete record: research, evaluation and run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,

    pub research: ResearchOutcome,

    /// Absent when evaluation is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,

    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Wall-clock duration of the whole run
    pub duration_secs: f64,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub max_iterations: usize,

    pub iterations_used: usize,

    /// Whether the research loop judged itself complete
    pub done: bool,

    /// Where the result was written, if it was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

impl PipelineResult {
    pub fn report(&self) -> &str {
        &self.research.report
    }
}
