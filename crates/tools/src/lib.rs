//! Action providers for the Sleuth agents.
//!
//! These give the loops the ability to interact with the world:
//! search the web, fetch and read pages, and run Python code in a
//! throwaway sandbox.

pub mod fetch;
pub mod html;
pub mod sandbox;
pub mod web_search;

use sleuth_config::AppConfig;
use sleuth_core::search::SearchProvider;
use std::sync::Arc;
use std::time::Duration;

pub use fetch::HttpFetcher;
pub use html::parse_html;
pub use sandbox::PythonSandbox;
pub use web_search::{DuckDuckGoSearch, PlaceholderSearch};

/// Build the search backend named by `search.backend`.
pub fn search_from_config(config: &AppConfig) -> Arc<dyn SearchProvider> {
    match config.search.backend.as_str() {
        "placeholder" => Arc::new(PlaceholderSearch),
        _ => Arc::new(DuckDuckGoSearch::new(Duration::from_secs(
            config.search.timeout_secs,
        ))),
    }
}

/// Build the Python sandbox from the `[code]` section.
pub fn sandbox_from_config(config: &AppConfig) -> PythonSandbox {
    PythonSandbox::new(&config.code.python)
        .with_timeout(Duration::from_secs(config.code.exec_timeout_secs))
        .with_max_output_chars(config.code.max_observation_chars)
}
