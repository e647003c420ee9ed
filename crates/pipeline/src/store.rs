//! JSON result store.
//!
//! Each result is written to its own pretty-printed file under the output
//! directory: `research_<query prefix>_<unix timestamp>.json`.

use crate::result::PipelineResult;
use chrono::Utc;
use sleuth_core::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters of the query kept in a generated filename.
const QUERY_PREFIX_CHARS: usize = 30;

pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `result` and return the path it landed at.
    ///
    /// Without a `filename`, one is derived from the query and the current
    /// time; an existing file is never overwritten.
    pub fn store(&self, result: &PipelineResult, filename: Option<&str>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = match filename {
            Some(name) => self.dir.join(name),
            None => self.unused_path(&result.query, Utc::now().timestamp()),
        };

        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&path, json)?;
        debug!(path = %path.display(), "Result saved");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<PipelineResult> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn unused_path(&self, query: &str, timestamp: i64) -> PathBuf {
        let stem = default_stem(query, timestamp);
        let mut path = self.dir.join(format!("{stem}.json"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}_{n}.json"));
            n += 1;
        }
        path
    }
}

/// Query prefix with every non-alphanumeric character mapped to `_`.
pub fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .take(QUERY_PREFIX_CHARS)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn default_stem(query: &str, timestamp: i64) -> String {
    format!("research_{}_{timestamp}", sanitize_query(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_maps_and_truncates() {
        assert_eq!(sanitize_query("what is rust?"), "what_is_rust_");
        assert_eq!(sanitize_query(&"a".repeat(50)).len(), 30);
        assert_eq!(sanitize_query("café/ünï"), "café_ünï");
    }

    #[test]
    fn default_name_layout() {
        assert_eq!(
            default_stem("rust async", 1_700_000_000),
            "research_rust_async_1700000000"
        );
    }

    #[test]
    fn unused_path_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        let first = store.unused_path("q", 42);
        std::fs::write(&first, "{}").unwrap();
        let second = store.unused_path("q", 42);

        assert_eq!(first.file_name().unwrap(), "research_q_42.json");
        assert_eq!(second.file_name().unwrap(), "research_q_42_1.json");
    }
}
