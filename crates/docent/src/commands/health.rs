//! Health command - checks the completion API and the tool server.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use docent_agent::{HealthReport, HealthStatus};
use docent_types::NoopStatus;

use super::Context;
use crate::runtime::build_session;

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Exit with a non-zero status when degraded
    #[arg(long)]
    pub strict: bool,
}

/// Health report for JSON output.
#[derive(Debug, Serialize)]
struct HealthOutput<'a> {
    #[serde(flatten)]
    report: &'a HealthReport,
    base_url: String,
    tool_endpoint: Option<String>,
}

/// Run the health command.
pub async fn run(args: HealthArgs, ctx: &Context) -> Result<()> {
    let mut session = build_session(&ctx.config, Arc::new(NoopStatus)).await?;
    let report = session.health_check().await;
    let tool_endpoint = session.gateway().endpoint().map(str::to_string);
    session.close().await;

    if ctx.json_output {
        let output = HealthOutput {
            report: &report,
            base_url: ctx.config.llm().base_url,
            tool_endpoint,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Docent Health").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!();
        println!(
            "  {} {}",
            dim.apply_to("Completion API:"),
            render_status(&report.completion_api)
        );
        println!("  {} {}", dim.apply_to("  URL:"), ctx.config.llm().base_url);
        println!(
            "  {} {}",
            dim.apply_to("Tool server:   "),
            render_status(&report.tool_server)
        );
        if let Some(endpoint) = &tool_endpoint {
            println!("  {} {}", dim.apply_to("  URL:"), endpoint);
        }
        println!();
        println!("  {} {}", dim.apply_to("Overall:"), report.overall);
        println!();
    }

    if args.strict && report.overall != docent_agent::Overall::Healthy {
        anyhow::bail!("health check degraded");
    }
    Ok(())
}

fn render_status(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => Style::new().green().apply_to("● healthy").to_string(),
        HealthStatus::Unhealthy(reason) => format!(
            "{} {}",
            Style::new().red().apply_to("● unhealthy"),
            Style::new().dim().apply_to(format!("({})", reason))
        ),
    }
}
