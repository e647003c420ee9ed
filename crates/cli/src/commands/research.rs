//! `sleuth research` — Research a single query.

use clap::{Args, ValueEnum};
use sleuth_config::AppConfig;
use sleuth_pipeline::PipelineResult;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct ResearchArgs {
    /// The research question
    pub query: String,

    /// Model to use instead of the configured default
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum research iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Also write the formatted output to this file
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Skip evaluating the report
    #[arg(long)]
    pub no_evaluation: bool,
}

/// Apply the command-line overrides shared by `research` and `batch`.
pub fn apply_overrides(
    config: &mut AppConfig,
    model: Option<String>,
    max_iterations: Option<usize>,
    no_evaluation: bool,
) -> Result<(), sleuth_config::ConfigError> {
    if let Some(model) = model {
        config.default_model = model;
    }
    if let Some(n) = max_iterations {
        config.research.max_iterations = n;
    }
    if no_evaluation {
        config.research.evaluate = false;
    }
    config.validate()
}

pub async fn run(
    mut config: AppConfig,
    args: ResearchArgs,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    apply_overrides(
        &mut config,
        args.model,
        args.max_iterations,
        args.no_evaluation,
    )?;

    tracing::info!(
        query = %args.query,
        model = %config.default_model,
        max_iterations = config.research.max_iterations,
        evaluate = config.research.evaluate,
        "Running research query"
    );

    let (pipeline, progress) = super::pipeline(config, verbose)?;
    let outcome = pipeline.run(&args.query).await;
    drop(pipeline);
    if let Some(handle) = progress {
        let _ = handle.await;
    }
    let result = outcome?;

    let formatted = format_result(&result, args.output_format)?;
    println!("{formatted}");

    if let Some(path) = args.output_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &formatted)?;
        tracing::info!(path = %path.display(), "Output written");
    }

    if let Some(saved) = &result.metadata.saved_to {
        eprintln!("Results saved to: {}", saved.display());
    }

    Ok(())
}

pub fn format_result(
    result: &PipelineResult,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_text(result: &PipelineResult) -> String {
    let rule = "=".repeat(80);
    let mut out = vec![
        format!("Research Query: {}", result.query),
        format!(
            "Iterations: {}/{}",
            result.metadata.iterations_used, result.metadata.max_iterations
        ),
        format!("Duration: {:.2} seconds", result.metadata.duration_secs),
        String::new(),
        "Research Report:".to_string(),
        rule.clone(),
        result.report().to_string(),
        rule,
    ];

    if let Some(evaluation) = &result.evaluation {
        out.push(String::new());
        out.push("Evaluation:".to_string());
        for aspect in &evaluation.aspects {
            out.push(format!("  {}: {}/10", aspect.aspect.label(), aspect.score));
        }
        out.push(format!("Overall Score: {:.1}/10", evaluation.overall.score));
        out.push(format!("Verdict: {}", evaluation.overall.verdict));
        out.push(String::new());
        out.push("Detailed Assessment:".to_string());
        out.push(evaluation.overall.narrative.clone());
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sleuth_agent::ResearchOutcome;
    use sleuth_core::evaluation::{
        Aspect, AspectEvaluation, Evaluation, OverallAssessment, Verdict,
    };
    use sleuth_core::finding::VisitedSet;
    use sleuth_pipeline::RunMetadata;

    fn sample(evaluation: Option<Evaluation>) -> PipelineResult {
        PipelineResult {
            query: "what is rust?".into(),
            research: ResearchOutcome {
                query: "what is rust?".into(),
                report: "Rust is a systems language.".into(),
                findings: Vec::new(),
                iterations: Vec::new(),
                iterations_used: 2,
                max_iterations: 5,
                done: true,
                sources_visited: VisitedSet::default(),
            },
            evaluation,
            metadata: RunMetadata {
                duration_secs: 1.234,
                started_at: Utc::now(),
                finished_at: Utc::now(),
                max_iterations: 5,
                iterations_used: 2,
                done: true,
                saved_to: None,
            },
        }
    }

    #[test]
    fn text_output_frames_report() {
        let text = format_result(&sample(None), OutputFormat::Text).unwrap();
        let rule = "=".repeat(80);
        assert!(text.starts_with("Research Query: what is rust?\nIterations: 2/5\nDuration: 1.23 seconds"));
        assert!(text.contains(&format!("{rule}\nRust is a systems language.\n{rule}")));
        assert!(!text.contains("Evaluation:"));
    }

    #[test]
    fn text_output_includes_evaluation() {
        let evaluation = Evaluation {
            aspects: vec![AspectEvaluation {
                aspect: Aspect::FactualAccuracy,
                score: 7,
                explanation: "ok".into(),
            }],
            overall: OverallAssessment {
                score: 7.5,
                verdict: Verdict::Good,
                narrative: "Solid overview.".into(),
            },
        };
        let text = format_result(&sample(Some(evaluation)), OutputFormat::Text).unwrap();
        assert!(text.contains("  Factual Accuracy: 7/10"));
        assert!(text.contains("Overall Score: 7.5/10"));
        assert!(text.contains("Verdict: Good"));
        assert!(text.ends_with("Detailed Assessment:\nSolid overview."));
    }

    #[test]
    fn json_output_is_the_full_result() {
        let json = format_result(&sample(None), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["query"], "what is rust?");
        assert_eq!(value["metadata"]["iterations_used"], 2);
        assert!(value.get("evaluation").is_none());
    }

    #[test]
    fn overrides_are_validated() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, Some("gpt-4o".into()), Some(3), true).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.research.max_iterations, 3);
        assert!(!config.research.evaluate);

        assert!(apply_overrides(&mut config, None, Some(0), false).is_err());
    }
}
