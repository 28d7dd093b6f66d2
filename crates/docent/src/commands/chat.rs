//! Chat command - interactive REPL mode.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use super::repl::Repl;
use super::{Context, parse_context};
use crate::runtime::build_session;
use crate::status::ConsoleStatus;

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Context entry kept for the whole session (repeatable)
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,
}

/// Run the chat command (REPL).
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let context = parse_context(&args.context)?;

    let mut session = build_session(&ctx.config, Arc::new(ConsoleStatus::new(ctx.verbose))).await?;
    for (key, value) in context {
        session.set_context(key, value);
    }

    let mut repl = Repl::new(session, ctx.verbose)?;
    let result = repl.run().await;
    repl.close().await;
    result
}
