//! Sleuth CLI — the main entry point.
//!
//! Commands:
//! - `research` — Research one query, evaluate the report
//! - `batch`    — Research a JSON array of queries concurrently
//! - `code`     — Solve a task by writing and running Python
//! - `settings` — Print the effective configuration
//! - `onboard`  — Write a default config file
//! - `doctor`   — Diagnose setup problems

use clap::{Parser, Subcommand};
use sleuth_config::{AppConfig, ConfigError, LoggingConfig};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "sleuth",
    about = "Sleuth — LLM research agent with self-evaluation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging and progress output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the configured log level
    #[arg(long, global = true, value_parser = clap::builder::PossibleValuesParser::new(sleuth_config::LOG_LEVELS))]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Config file to load instead of ~/.sleuth/config.toml
    #[arg(short, long, global = true, env = "SLEUTH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a query and evaluate the report
    Research(commands::research::ResearchArgs),

    /// Research every query in a JSON array file
    Batch(commands::batch::BatchArgs),

    /// Solve a task by generating and running Python code
    Code(commands::code::CodeArgs),

    /// Show the effective settings (secrets redacted)
    Settings {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Onboard,

    /// Diagnose configuration and environment
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // onboard and doctor run even when the config file is broken.
    let loaded = AppConfig::load_with(cli.config.as_deref());
    let mut log_config = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    if let Some(file) = cli.log_file {
        log_config.file = Some(file);
    }
    logging::init(&log_config, cli.verbose)?;

    let verbose = cli.verbose;
    match cli.command {
        Commands::Onboard => commands::onboard::run(cli.config.as_deref())?,
        Commands::Doctor => commands::doctor::run(cli.config.as_deref()).await?,
        Commands::Settings { json } => commands::settings::run(&effective(loaded, log_config)?, json)?,
        Commands::Research(args) => {
            commands::research::run(effective(loaded, log_config)?, args, verbose).await?
        }
        Commands::Batch(args) => {
            commands::batch::run(effective(loaded, log_config)?, args, verbose).await?
        }
        Commands::Code(args) => {
            commands::code::run(effective(loaded, log_config)?, args, verbose).await?
        }
    }

    Ok(())
}

/// The loaded config with command-line logging overrides applied.
fn effective(loaded: Result<AppConfig, ConfigError>, logging: LoggingConfig) -> Result<AppConfig, String> {
    let mut config = loaded.map_err(|e| format!("Failed to load config: {e}"))?;
    config.logging = logging;
    Ok(config)
}
