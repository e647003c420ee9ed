//! Research findings and the per-run visited-URL set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A summarized source judged useful for the research question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub summary: String,

    pub is_useful: bool,
}

/// URLs already processed during one research run.
///
/// Grows monotonically and keeps first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct VisitedSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url`. Returns `true` if it had not been seen before.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.order.push(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for VisitedSet {
    fn from(urls: Vec<String>) -> Self {
        let mut set = Self::new();
        for url in &urls {
            set.insert(url);
        }
        set
    }
}

impl From<VisitedSet> for Vec<String> {
    fn from(set: VisitedSet) -> Self {
        set.order
    }
}
