//! Docent - tool-augmented document search assistant
//!
//! Main entry point for the Docent CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::Style;

mod commands;
mod conversation_log;
mod runtime;
mod status;

use commands::{ask, chat, health};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Docent - tool-augmented document search assistant
#[derive(Parser)]
#[command(name = "docent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file, layered over the discovered ones
    #[arg(short, long, global = true, env = "DOCENT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// Enter interactive chat mode (REPL)
    Chat(chat::ChatArgs),

    /// Check the completion API and the tool server
    Health(health::HealthArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = docent_config::load_config(cli.config.as_deref())?;

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "docent=debug,docent_agent=debug,docent_llm=debug,docent_mcp=debug,docent_config=debug,info"
    } else {
        "docent=warn,docent_agent=warn,docent_llm=warn,docent_mcp=warn,error"
    };

    let log_dir = loaded.config.logging().resolved_dir();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "docent.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "docent=trace,docent_agent=trace,docent_llm=trace,docent_mcp=trace,docent_config=trace,info",
                )),
        )
        .init();

    let yellow = Style::new().yellow();
    for warning in &loaded.warnings {
        eprintln!("{} {}", yellow.apply_to("Warning:"), warning);
    }
    for path in loaded.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded config layer");
    }

    let ctx = commands::Context {
        config: loaded.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Chat(args) => chat::run(args, &ctx).await,
        Commands::Health(args) => health::run(args, &ctx).await,
    }
}
