//! `sleuth code` — Solve a task with the code-executing loop.

use clap::Args;
use sleuth_agent::{AgentLoop, CodeLoop, LoopOutcome};
use sleuth_config::AppConfig;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct CodeArgs {
    /// The task to solve
    pub task: String,

    /// Model to use instead of the configured default
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum generate-and-run steps
    #[arg(long)]
    pub max_steps: Option<usize>,
}

pub async fn run(
    mut config: AppConfig,
    args: CodeArgs,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(model) = args.model {
        config.default_model = model;
    }
    if let Some(n) = args.max_steps {
        config.code.max_steps = n;
    }
    config.validate()?;

    let provider = super::provider(&config)?;
    let sandbox = Arc::new(sleuth_tools::sandbox_from_config(&config));
    let cancel = super::cancel_on_ctrl_c();
    let progress = super::progress_bus(verbose);

    let agent = CodeLoop::from_config(&config, provider, sandbox).map_session(|mut s| {
        s = s.with_cancellation(cancel);
        if let Some((events, _)) = &progress {
            s = s.with_events(events.clone());
        }
        s
    });
    let mut agent = AgentLoop::Code(agent);

    let outcome = agent.run(&args.task).await;
    drop(agent);
    if let Some((events, handle)) = progress {
        drop(events);
        let _ = handle.await;
    }

    let LoopOutcome::Code(outcome) = outcome? else {
        return Err("code loop returned a research outcome".into());
    };

    for step in &outcome.steps {
        println!("--- Step {} ---", step.step_index + 1);
        if let Some(code) = &step.extracted_code {
            println!("{code}");
        }
        println!("Observation: {}", step.observation);
    }
    println!();
    match &outcome.answer {
        Some(answer) => println!("Final answer: {answer}"),
        None => println!(
            "No final answer after {}/{} steps.",
            outcome.steps_used, outcome.max_steps
        ),
    }

    Ok(())
}
