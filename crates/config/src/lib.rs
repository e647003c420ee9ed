//! Configuration loading, validation, and management for Sleuth.
//!
//! Loads configuration from `~/.sleuth/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Search backends accepted by `search.backend`.
pub const SEARCH_BACKENDS: [&str; 2] = ["duckduckgo", "placeholder"];

/// The root configuration structure.
///
/// Maps directly to `~/.sleuth/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Research loop settings
    #[serde(default)]
    pub research: ResearchConfig,

    /// Code-execution loop settings
    #[serde(default)]
    pub code: CodeConfig,

    /// Evaluator settings
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Concurrency, timeouts and retries for model calls
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Result persistence
    #[serde(default)]
    pub output: OutputConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_true() -> bool {
    true
}

const REDACTED: &str = "[REDACTED]";

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => REDACTED,
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("research", &self.research)
            .field("code", &self.code)
            .field("evaluator", &self.evaluator)
            .field("search", &self.search)
            .field("runtime", &self.runtime)
            .field("output", &self.output)
            .field("logging", &self.logging)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_max_sub_queries")]
    pub max_sub_queries: usize,

    /// Hits kept per sub-query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Page content passed to the model is cut to this many chars
    #[serde(default = "default_content_char_limit")]
    pub content_char_limit: usize,

    /// Run the evaluator after each research run
    #[serde(default = "default_true")]
    pub evaluate: bool,
}

fn default_max_iterations() -> usize {
    5
}
fn default_max_sub_queries() -> usize {
    4
}
fn default_max_results() -> usize {
    10
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_content_char_limit() -> usize {
    5000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_sub_queries: default_max_sub_queries(),
            max_results: default_max_results(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            content_char_limit: default_content_char_limit(),
            evaluate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Interpreter binary
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,

    #[serde(default = "default_max_observation_chars")]
    pub max_observation_chars: usize,
}

fn default_max_steps() -> usize {
    6
}
fn default_python() -> String {
    "python3".into()
}
fn default_exec_timeout_secs() -> u64 {
    30
}
fn default_max_observation_chars() -> usize {
    10_000
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            python: default_python(),
            exec_timeout_secs: default_exec_timeout_secs(),
            max_observation_chars: default_max_observation_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_evaluator_temperature")]
    pub temperature: f32,

    /// Falls back to `default_model` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_evaluator_temperature() -> f32 {
    0.2
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            temperature: default_evaluator_temperature(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// `duckduckgo` or `placeholder`
    #[serde(default = "default_search_backend")]
    pub backend: String,

    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_backend() -> String {
    "duckduckgo".into()
}
fn default_search_timeout_secs() -> u64 {
    15
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_search_backend(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Cap on in-flight model calls across all task instances
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_concurrent_requests() -> usize {
    5
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_true")]
    pub save_results: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            save_results: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            json: false,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.sleuth/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `SLEUTH_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load from `path` (or the default path), then apply environment overrides.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `SLEUTH_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("SLEUTH_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if let Some(provider) = lookup("SLEUTH_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("SLEUTH_MODEL") {
            self.default_model = model;
        }

        if let Some(raw) = lookup("SLEUTH_MAX_ITERATIONS") {
            self.research.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "SLEUTH_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(level) = lookup("SLEUTH_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        if let Some(dir) = lookup("SLEUTH_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sleuth")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check_temperature = |name: &str, t: f32| {
            if !(0.0..=2.0).contains(&t) {
                Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )))
            } else {
                Ok(())
            }
        };
        check_temperature("default_temperature", self.default_temperature)?;
        check_temperature("evaluator.temperature", self.evaluator.temperature)?;

        let positive = [
            ("research.max_iterations", self.research.max_iterations),
            ("research.max_sub_queries", self.research.max_sub_queries),
            ("research.max_results", self.research.max_results),
            ("research.content_char_limit", self.research.content_char_limit),
            ("code.max_steps", self.code.max_steps),
            ("code.max_observation_chars", self.code.max_observation_chars),
            (
                "runtime.max_concurrent_requests",
                self.runtime.max_concurrent_requests,
            ),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be > 0".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level '{}', expected one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if !SEARCH_BACKENDS.contains(&self.search.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown search backend '{}', expected one of {}",
                self.search.backend,
                SEARCH_BACKENDS.join(", ")
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Model used by the evaluator.
    pub fn evaluator_model(&self) -> &str {
        self.evaluator.model.as_deref().unwrap_or(&self.default_model)
    }

    /// A copy with every secret replaced, safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some(REDACTED.into());
        }
        for provider in copy.providers.values_mut() {
            if provider.api_key.is_some() {
                provider.api_key = Some(REDACTED.into());
            }
        }
        copy
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            research: ResearchConfig::default(),
            code: CodeConfig::default(),
            evaluator: EvaluatorConfig::default(),
            search: SearchConfig::default(),
            runtime: RuntimeConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for sleuth_core::Error {
    fn from(err: ConfigError) -> Self {
        sleuth_core::Error::Config {
            message: err.to_string(),
        }
    }
}
