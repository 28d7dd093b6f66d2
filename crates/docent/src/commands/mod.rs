//! CLI command handlers.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};

use docent_config::DocentConfig;

pub mod ask;
pub mod chat;
pub mod health;
pub mod repl;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: DocentConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Parse repeated `key=value` arguments into session context.
pub fn parse_context(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("expected key=value, got '{}'", pair))?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("empty context key in '{}'", pair);
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_context() {
        let ctx = parse_context(&["user=alice".to_string(), "page = run plan ".to_string()])
            .unwrap();
        assert_eq!(ctx["user"], "alice");
        assert_eq!(ctx["page"], "run plan");
    }

    #[test]
    fn test_parse_context_value_may_contain_equals() {
        let ctx = parse_context(&["filter=a=b".to_string()]).unwrap();
        assert_eq!(ctx["filter"], "a=b");
    }

    #[test]
    fn test_parse_context_rejects_bad_pairs() {
        assert!(parse_context(&["novalue".to_string()]).is_err());
        assert!(parse_context(&["=x".to_string()]).is_err());
    }
}
