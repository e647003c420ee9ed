//! Python sandbox — run model-written code in a throwaway interpreter.
//!
//! Every `execute` spawns a fresh `python3 -I` in a fresh temporary
//! directory with a cleared environment, so no state survives between
//! steps or between task instances.

use async_trait::async_trait;
use sleuth_core::error::SandboxError;
use sleuth_core::sandbox::{CodeSandbox, ExecutionOutput};
use sleuth_core::text::truncate_chars;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Defines `final_answer` for the model's code.
const PRELUDE: &str = r#"def final_answer(value):
    print(f"Final answer: {value}")

"#;

const SYNTAX_CHECK: &str = "import ast, sys; ast.parse(sys.stdin.read())";

pub struct PythonSandbox {
    python: String,
    timeout: Duration,
    max_output_chars: usize,
}

impl PythonSandbox {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            timeout: Duration::from_secs(30),
            max_output_chars: 10_000,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_chars(mut self, max_output_chars: usize) -> Self {
        self.max_output_chars = max_output_chars;
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.python
    }

    /// Base command: isolated mode, no inherited environment but PATH.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-I")
            .env_clear()
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> SandboxError {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::InterpreterUnavailable(self.python.clone())
        } else {
            SandboxError::Setup(e.to_string())
        }
    }

    fn clip(&self, text: &str) -> String {
        let clipped = truncate_chars(text, self.max_output_chars);
        if clipped.len() < text.len() {
            format!("{clipped}\n... (output truncated)")
        } else {
            clipped.to_string()
        }
    }

    /// Ask the interpreter whether it can run `--version`.
    pub async fn probe(&self) -> Result<String, SandboxError> {
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            Ok(String::from_utf8_lossy(&output.stderr).trim().to_string())
        } else {
            Ok(version)
        }
    }
}

#[async_trait]
impl CodeSandbox for PythonSandbox {
    fn name(&self) -> &str {
        "python"
    }

    async fn check_syntax(&self, code: &str) -> Result<(), String> {
        // Source goes through stdin; argv is too small for long replies.
        let mut child = self
            .command()
            .arg("-c")
            .arg(SYNTAX_CHECK)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e).to_string())?;

        let source = code.to_owned();
        let stdin = child.stdin.take();
        let checked = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(source.as_bytes()).await?;
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(self.timeout, checked).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("invalid syntax")
                    .trim()
                    .to_string())
            }
            Ok(Err(e)) => Err(SandboxError::Setup(e.to_string()).to_string()),
            Err(_) => Err("syntax check timed out".into()),
        }
    }

    async fn execute(&self, code: &str) -> Result<ExecutionOutput, SandboxError> {
        let workdir = tempfile::tempdir().map_err(|e| SandboxError::Setup(e.to_string()))?;
        let script = workdir.path().join("main.py");
        tokio::fs::write(&script, format!("{PRELUDE}{code}\n"))
            .await
            .map_err(|e| SandboxError::Setup(e.to_string()))?;

        debug!(interpreter = %self.python, bytes = code.len(), "Executing sandboxed code");
        let started = Instant::now();

        let child = self
            .command()
            .arg("main.py")
            .current_dir(workdir.path())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| SandboxError::Setup(e.to_string()))?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Sandboxed code timed out");
                return Ok(ExecutionOutput {
                    stdout: String::new(),
                    error: Some(format!(
                        "execution timed out after {}s",
                        self.timeout.as_secs()
                    )),
                    timed_out: true,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
        };

        let stdout = self.clip(&String::from_utf8_lossy(&output.stdout));
        let error = if output.status.success() {
            None
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            Some(if stderr.is_empty() {
                format!("process exited with {}", output.status)
            } else {
                self.clip(stderr)
            })
        };

        Ok(ExecutionOutput {
            stdout,
            error,
            timed_out: false,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}
