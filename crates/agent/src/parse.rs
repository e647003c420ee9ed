//! Parsers for free-form model replies.
//!
//! None of these fail: a reply that cannot be read falls back to a
//! documented default so the loop always has something to act on.

use regex_lite::Regex;
use sleuth_core::evaluation::Verdict;
use sleuth_core::finding::Finding;
use std::sync::LazyLock;

/// Observation recorded when a code-loop reply contains no runnable code.
pub const NO_CODE_OBSERVATION: &str =
    "No valid code found in the response. Please provide Python code in a ```py fenced block.";

/// Score used when a reply contains no usable number.
pub const DEFAULT_SCORE: u8 = 5;

static CODE_BLOCK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:py|python)[ \t]*\r?\n(.*?)```").ok());

static FINAL_ANSWER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*final answer:[ \t]*(.*?)[ \t]*$").ok());

/// Strip a ```json or bare ``` fence around a JSON payload.
fn unfence(reply: &str) -> &str {
    let reply = reply.trim();
    let body = if let Some((_, rest)) = reply.split_once("```json") {
        rest
    } else if let Some((_, rest)) = reply.split_once("```") {
        rest
    } else {
        return reply;
    };
    body.split_once("```").map_or(body, |(inner, _)| inner).trim()
}

fn json_values(reply: &str) -> Option<serde_json::Value> {
    let body = unfence(reply);
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }
    // Arrays wrapped in prose: take the outermost brackets.
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// Read the sub-query list from a reply, falling back to `[task]`.
pub fn parse_sub_queries(reply: &str, task: &str, max: usize) -> Vec<String> {
    let candidates: Vec<String> = match json_values(reply) {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(serde_json::Value::String(s)) => vec![s],
        _ => Vec::new(),
    };

    let mut queries: Vec<String> = Vec::new();
    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() || queries.iter().any(|q| q == candidate) {
            continue;
        }
        queries.push(candidate.to_string());
    }
    queries.truncate(max.max(1));

    if queries.is_empty() {
        vec![task.to_string()]
    } else {
        queries
    }
}

pub fn is_complete(reply: &str) -> bool {
    reply.trim().to_uppercase().starts_with("COMPLETE")
}

pub fn is_useful(reply: &str) -> bool {
    !reply.to_lowercase().contains("not useful")
}

/// Join every ```py / ```python block in the reply.
pub fn extract_code_blocks(reply: &str) -> Option<String> {
    let re = CODE_BLOCK_RE.as_ref()?;
    let blocks: Vec<&str> = re
        .captures_iter(reply)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end())
        .filter(|code| !code.trim().is_empty())
        .collect();
    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    }
}

fn is_error_observation(observation: &str) -> bool {
    let trimmed = observation.trim();
    trimmed == NO_CODE_OBSERVATION
        || trimmed.starts_with("Error:")
        || trimmed.contains("\nError:")
}

/// Look for the loop's answer in an observation.
///
/// An explicit `Final answer: <value>` line wins. Failing that, a clean
/// single-line observation is taken as the answer.
pub fn detect_final_answer(observation: &str) -> Option<String> {
    if let Some(re) = FINAL_ANSWER_RE.as_ref()
        && let Some(value) = re.captures(observation).and_then(|c| c.get(1))
    {
        return Some(value.as_str().to_string());
    }

    if is_error_observation(observation) {
        return None;
    }
    let mut lines = observation.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(only), None) => Some(only.to_string()),
        _ => None,
    }
}

/// First whitespace token that reads as an integer in `1..=10`.
///
/// Surrounding punctuation is stripped. An out-of-ten fraction such as
/// `7/10` counts as its numerator; other slashed tokens (dates, ratios)
/// are skipped.
pub fn find_score(text: &str) -> Option<u8> {
    const STRIP: &[char] = &[
        ',', '.', '(', ')', '[', ']', '{', '}', ':', ';', '*', '"', '\'',
    ];

    text.split_whitespace().find_map(|token| {
        let token = token.trim_matches(STRIP);
        let token = match token.split_once('/') {
            Some((numerator, "10")) => numerator,
            Some(_) => return None,
            None => token,
        };
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match token.parse::<u32>() {
            Ok(n @ 1..=10) => Some(n as u8),
            _ => None,
        }
    })
}

/// [`find_score`] with the default of 5.
pub fn extract_score(text: &str) -> u8 {
    find_score(text).unwrap_or(DEFAULT_SCORE)
}

pub fn extract_verdict(text: &str) -> Verdict {
    let lower = text.to_lowercase();
    if lower.contains("excellent") {
        Verdict::Excellent
    } else if lower.contains("good") {
        Verdict::Good
    } else if lower.contains("needs improvement") {
        Verdict::NeedsImprovement
    } else if lower.contains("inadequate") {
        Verdict::Inadequate
    } else {
        Verdict::Satisfactory
    }
}

/// `Source: <url>\nSummary: <summary>` blocks separated by blank lines.
pub fn format_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("Source: {}\nSummary: {}", f.url, f.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}
