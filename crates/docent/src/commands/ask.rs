//! Ask command - one-shot question.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, parse_context};
use crate::runtime::build_session;
use crate::status::ConsoleStatus;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send
    #[arg(required = true)]
    pub prompt: String,

    /// Context entry for the system prompt (repeatable)
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,
}

/// Answer for JSON output.
#[derive(Debug, Serialize)]
struct AskOutput<'a> {
    conversation_id: &'a str,
    answer: &'a str,
    messages: usize,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let context = parse_context(&args.context)?;
    let dim = Style::new().dim();

    if ctx.verbose {
        let llm = ctx.config.llm();
        eprintln!(
            "{}",
            dim.apply_to(format!("Sending to: {} ({})", llm.base_url, llm.model))
        );
    }

    let mut session = build_session(&ctx.config, Arc::new(ConsoleStatus::new(ctx.verbose))).await?;
    let result = session.chat(&args.prompt, Some(&context)).await;
    session.close().await;

    let answer = result?;
    if ctx.json_output {
        let output = AskOutput {
            conversation_id: session.id(),
            answer: &answer,
            messages: session.get_conversation().len(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", answer);
    }
    Ok(())
}
