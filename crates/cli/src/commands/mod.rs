pub mod batch;
pub mod code;
pub mod doctor;
pub mod onboard;
pub mod research;
pub mod settings;

use sleuth_config::AppConfig;
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::provider::Provider;
use sleuth_pipeline::ResearchPipeline;
use sleuth_tools::HttpFetcher;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Event bus capacity for progress output.
const EVENT_CAPACITY: usize = 1024;

/// The default provider stack, with a pointer to `doctor` on failure.
pub fn provider(config: &AppConfig) -> Result<Arc<dyn Provider>, String> {
    sleuth_providers::build_provider(config).map_err(|e| {
        format!("{e}. Set SLEUTH_API_KEY (or OPENAI_API_KEY) or run `sleuth doctor`.")
    })
}

/// A pipeline wired to the configured gateway, search backend and fetcher,
/// cancelled on Ctrl+C. In verbose mode progress is printed until the
/// returned handle completes, which happens once the pipeline is dropped.
pub fn pipeline(
    config: AppConfig,
    verbose: bool,
) -> Result<(ResearchPipeline, Option<JoinHandle<()>>), String> {
    let provider = provider(&config)?;
    let search = sleuth_tools::search_from_config(&config);
    let mut pipeline = ResearchPipeline::new(config, provider, search, Arc::new(HttpFetcher::new()))
        .with_cancellation(cancel_on_ctrl_c());

    let mut progress = None;
    if let Some((events, handle)) = progress_bus(verbose) {
        pipeline = pipeline.with_events(events);
        progress = Some(handle);
    }
    Ok((pipeline, progress))
}

/// Verbose-mode bus and its printer.
pub fn progress_bus(verbose: bool) -> Option<(Arc<EventBus>, JoinHandle<()>)> {
    verbose.then(|| {
        let events = Arc::new(EventBus::new(EVENT_CAPACITY));
        let handle = spawn_progress(&events);
        (events, handle)
    })
}

/// A token cancelled on Ctrl+C. Running loops stop at their next model,
/// search, fetch or sandbox call.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Interrupted, stopping...");
            child.cancel();
        }
    });
    token
}

/// Print progress events to stderr until the bus is dropped.
pub fn spawn_progress(events: &Arc<EventBus>) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = progress_line(&event) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(n)) => eprintln!("  ... {n} events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn short_id(task_id: &str) -> &str {
    task_id.get(..8).unwrap_or(task_id)
}

/// One human-readable line per event. Model calls are left to the logs.
pub fn progress_line(event: &DomainEvent) -> Option<String> {
    let line = match event {
        DomainEvent::ModelInvoked { .. } => return None,
        DomainEvent::SourceProcessed {
            task_id, url, useful, ..
        } => {
            let mark = if *useful { "+" } else { "-" };
            format!("  [{}] {mark} {url}", short_id(task_id))
        }
        DomainEvent::IterationCompleted {
            task_id,
            iteration,
            findings,
            complete,
            ..
        } => format!(
            "  [{}] iteration {iteration} done: {findings} findings{}",
            short_id(task_id),
            if *complete { ", complete" } else { "" }
        ),
        DomainEvent::StepExecuted {
            task_id,
            step,
            observation_preview,
            ..
        } => format!(
            "  [{}] step {step}: {observation_preview}",
            short_id(task_id)
        ),
        DomainEvent::TaskCompleted {
            task_id,
            rounds_used,
            done,
            duration_ms,
            ..
        } => format!(
            "  [{}] finished after {rounds_used} rounds in {:.1}s{}",
            short_id(task_id),
            *duration_ms as f64 / 1000.0,
            if *done { "" } else { " (budget exhausted)" }
        ),
        DomainEvent::TaskFailed {
            task_id,
            error_message,
            ..
        } => format!("  [{task_id}] failed: {error_message}"),
    };
    Some(line)
}
