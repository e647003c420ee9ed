//! Code sandbox abstraction used by the code-execution loop.

use crate::error::SandboxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What one sandboxed run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Captured standard output
    pub stdout: String,

    /// Traceback or failure text for a non-zero exit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub timed_out: bool,

    pub duration_ms: u64,
}

impl ExecutionOutput {
    /// Render the run as the observation text fed back to the model.
    pub fn observation(&self) -> String {
        let stdout = self.stdout.trim_end();
        match &self.error {
            Some(err) if stdout.is_empty() => format!("Error: {}", err.trim_end()),
            Some(err) => format!("{stdout}\nError: {}", err.trim_end()),
            None => stdout.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.timed_out
    }
}

/// Runs untrusted code in isolation. Each `execute` call starts from a
/// clean interpreter; nothing leaks between calls.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    fn name(&self) -> &str;

    /// Ok if `code` parses as a program for this sandbox's language.
    async fn check_syntax(&self, code: &str) -> Result<(), String>;

    async fn execute(&self, code: &str) -> Result<ExecutionOutput, SandboxError>;
}
