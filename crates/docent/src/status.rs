//! Status events rendered on the terminal.

use console::Style;

use docent_types::{SinkResult, StatusEvent, StatusSink};

/// Prints status events as dim lines on stderr.
///
/// Context updates are noisy and only shown in verbose mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleStatus {
    verbose: bool,
}

impl ConsoleStatus {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Line to print for an event, if any.
    pub fn render(&self, event: &StatusEvent) -> Option<String> {
        match event {
            StatusEvent::ContextUpdate { .. } if !self.verbose => None,
            _ => Some(format!("[{}]", event)),
        }
    }
}

impl StatusSink for ConsoleStatus {
    fn notify(&self, event: &StatusEvent) -> SinkResult<()> {
        tracing::debug!(kind = event.kind(), "{}", event);
        if let Some(line) = self.render(event) {
            let dim = Style::new().dim();
            eprintln!("{}", dim.apply_to(line));
        }
        Ok(())
    }
}
