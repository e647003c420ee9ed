//! `sleuth batch` — Research every query in a JSON file.

use clap::Args;
use sleuth_config::AppConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// JSON file holding an array of query strings
    pub input_file: PathBuf,

    /// Model to use instead of the configured default
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum research iterations per query
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Where result files are written
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip evaluating the reports
    #[arg(long)]
    pub no_evaluation: bool,

    /// Queries researched at once (also caps concurrent model calls)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Read a JSON array of queries. Blank entries are dropped.
pub fn load_queries(path: &Path) -> Result<Vec<String>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Error loading queries from {}: {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Error loading queries from {}: {e}", path.display()))?;
    let items = value
        .as_array()
        .ok_or("Input file must contain a JSON array of queries")?;

    items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(s.trim().to_string()),
            other => Err(format!("Every query must be a string, got {other}")),
        })
        .filter(|q| !matches!(q, Ok(s) if s.is_empty()))
        .collect()
}

pub async fn run(
    mut config: AppConfig,
    args: BatchArgs,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let queries = load_queries(&args.input_file)?;
    if queries.is_empty() {
        println!("No queries in {}", args.input_file.display());
        return Ok(());
    }

    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if let Some(n) = args.concurrency {
        config.runtime.max_concurrent_requests = n;
    }
    config.output.save_results = true;
    super::research::apply_overrides(
        &mut config,
        args.model,
        args.max_iterations,
        args.no_evaluation,
    )?;

    tracing::info!(
        queries = queries.len(),
        model = %config.default_model,
        max_iterations = config.research.max_iterations,
        evaluate = config.research.evaluate,
        output_dir = %config.output.dir.display(),
        "Running batch research"
    );

    let (pipeline, progress) = super::pipeline(config, verbose)?;
    let results = pipeline.run_batch(&queries).await;
    drop(pipeline);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    for result in &results {
        let score = result
            .evaluation
            .as_ref()
            .map(|e| format!("{:.1}/10", e.overall.score))
            .unwrap_or_else(|| "-".into());
        let saved = result
            .metadata
            .saved_to
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not saved)".into());
        println!("  {score:>7}  {}  -> {saved}", result.query);
    }
    println!();
    println!(
        "{} of {} queries completed.",
        results.len(),
        queries.len()
    );

    Ok(())
}
