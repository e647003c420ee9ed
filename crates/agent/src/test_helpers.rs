//! Shared test doubles for the loop and evaluator tests.

use async_trait::async_trait;
use sleuth_core::error::{FetchError, ProviderError, SandboxError, SearchError};
use sleuth_core::message::Message;
use sleuth_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sleuth_core::sandbox::{CodeSandbox, ExecutionOutput};
use sleuth_core::search::{FetchProvider, FetchedPage, SearchHit, SearchProvider};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next result in the queue.
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    results: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(results: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Only successful text replies.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let results = self.results.lock().unwrap();
        let call = requests.len();

        if call >= results.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                call,
                results.len()
            );
        }

        let model = request.model.clone();
        requests.push(request);
        results[call].clone().map(|text| make_text_response(&text, &model))
    }
}

pub fn make_text_response(text: &str, model: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: model.to_string(),
    }
}

enum SearchMode {
    /// `n` distinct hits per query, derived from the query text.
    PerQuery(usize),
    /// The same URLs for every query.
    Fixed(Vec<String>),
    Failing,
}

pub struct MockSearch {
    mode: SearchMode,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    fn with_mode(mode: SearchMode) -> Self {
        Self {
            mode,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn per_query(n: usize) -> Self {
        Self::with_mode(SearchMode::PerQuery(n))
    }

    pub fn fixed(urls: &[&str]) -> Self {
        Self::with_mode(SearchMode::Fixed(urls.iter().map(|u| u.to_string()).collect()))
    }

    pub fn failing() -> Self {
        Self::with_mode(SearchMode::Failing)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock_search"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        let hits: Vec<SearchHit> = match &self.mode {
            SearchMode::PerQuery(n) => {
                let slug = query.replace(' ', "-");
                (0..*n)
                    .map(|i| {
                        SearchHit::new(
                            format!("https://example.test/{slug}/{i}"),
                            Some(format!("{query} result {i}")),
                            format!("snippet for {query} #{i}"),
                        )
                    })
                    .collect()
            }
            SearchMode::Fixed(urls) => urls
                .iter()
                .map(|u| SearchHit::new(u.clone(), None, format!("snippet for {u}")))
                .collect(),
            SearchMode::Failing => {
                return Err(SearchError::Unavailable("mock search is down".into()));
            }
        };
        Ok(hits.into_iter().take(max_results).collect())
    }
}

enum FetchMode {
    Ok,
    Text(String),
    Failing,
}

pub struct MockFetch {
    mode: FetchMode,
    fetched: Mutex<Vec<String>>,
}

impl MockFetch {
    fn with_mode(mode: FetchMode) -> Self {
        Self {
            mode,
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Every URL returns a small page naming the URL.
    pub fn ok() -> Self {
        Self::with_mode(FetchMode::Ok)
    }

    pub fn with_text(text: &str) -> Self {
        Self::with_mode(FetchMode::Text(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::with_mode(FetchMode::Failing)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchProvider for MockFetch {
    fn name(&self) -> &str {
        "mock_fetch"
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match &self.mode {
            FetchMode::Ok => Ok(FetchedPage {
                title: Some("Page".into()),
                description: None,
                text: format!("Body of {url}"),
            }),
            FetchMode::Text(text) => Ok(FetchedPage {
                title: None,
                description: None,
                text: text.clone(),
            }),
            FetchMode::Failing => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// A tiny stand-in interpreter that understands the statements the
/// tests use: `final_answer(x)`, `print('text')`, `print(n)` and
/// `print(a * b)`. Anything else raises a `NameError`.
pub struct MockSandbox {
    failure: Option<SandboxError>,
    executed: Mutex<Vec<String>>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self {
            failure: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SandboxError) -> Self {
        Self {
            failure: Some(error),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn call_parts(line: &str) -> Option<(&str, &str)> {
        let line = line.trim();
        let (name, rest) = line.split_once('(')?;
        let args = rest.strip_suffix(')')?;
        let valid_name = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid_name.then_some((name, args))
    }

    fn eval(expr: &str) -> Result<String, String> {
        let expr = expr.trim();
        let unquoted = expr
            .strip_prefix('\'')
            .and_then(|e| e.strip_suffix('\''))
            .or_else(|| expr.strip_prefix('"').and_then(|e| e.strip_suffix('"')));
        if let Some(text) = unquoted {
            return Ok(text.to_string());
        }
        if let Ok(n) = expr.parse::<i64>() {
            return Ok(n.to_string());
        }
        if let Some((a, b)) = expr.split_once('*')
            && let (Ok(a), Ok(b)) = (a.trim().parse::<i64>(), b.trim().parse::<i64>())
        {
            return Ok((a * b).to_string());
        }
        Err(format!("NameError: name '{expr}' is not defined"))
    }
}

#[async_trait]
impl CodeSandbox for MockSandbox {
    fn name(&self) -> &str {
        "mock_sandbox"
    }

    async fn check_syntax(&self, code: &str) -> Result<(), String> {
        let all_calls = code
            .lines()
            .filter(|l| !l.trim().is_empty())
            .all(|l| Self::call_parts(l).is_some());
        if all_calls {
            Ok(())
        } else {
            Err("SyntaxError: invalid syntax".into())
        }
    }

    async fn execute(&self, code: &str) -> Result<ExecutionOutput, SandboxError> {
        self.executed.lock().unwrap().push(code.to_string());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut stdout = String::new();
        for line in code.lines().filter(|l| !l.trim().is_empty()) {
            let outcome = match Self::call_parts(line) {
                Some(("print", args)) => Self::eval(args),
                Some(("final_answer", args)) => Self::eval(args).map(|v| format!("Final answer: {v}")),
                _ => Err("SyntaxError: invalid syntax".to_string()),
            };
            match outcome {
                Ok(text) => {
                    stdout.push_str(&text);
                    stdout.push('\n');
                }
                Err(error) => {
                    return Ok(ExecutionOutput {
                        stdout,
                        error: Some(error),
                        timed_out: false,
                        duration_ms: 1,
                    });
                }
            }
        }

        Ok(ExecutionOutput {
            stdout,
            error: None,
            timed_out: false,
            duration_ms: 1,
        })
    }
}
