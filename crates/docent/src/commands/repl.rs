//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use anyhow::Result;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

use docent_agent::{ConversationSession, HealthStatus};
use docent_llm::Role;

/// Characters of each message shown by `/history`.
const HISTORY_PREVIEW_CHARS: usize = 120;

/// Result of a slash command.
enum ControlFlow {
    Continue,
    Exit,
}

/// REPL state and configuration.
pub struct Repl {
    session: ConversationSession,
    editor: Editor<(), DefaultHistory>,
    term: Term,
    verbose: bool,
}

impl Repl {
    /// Create a new REPL around a session.
    pub fn new(session: ConversationSession, verbose: bool) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            session,
            editor,
            term: Term::stdout(),
            verbose,
        })
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match self.handle_slash_command(line).await {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                self.print_error(&format!("Command error: {}", e));
                                continue;
                            }
                        }
                    }

                    self.send_message(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    self.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.print_dim("Goodbye!");
        Ok(())
    }

    /// Flush the log and release the tool connection.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    /// Send a message and print the answer.
    async fn send_message(&mut self, message: &str) {
        match self.session.chat(message, None).await {
            Ok(answer) => {
                println!();
                println!("{}", answer);
                println!();
            }
            Err(e) if e.is_context_too_large() => {
                self.print_error(&e.to_string());
                self.print_dim("Use /clear to start over with an empty conversation.");
            }
            Err(e) if e.is_transient() => {
                self.print_error(&e.to_string());
                self.print_dim("Use /retry to continue once the service recovers.");
            }
            Err(e) => self.print_error(&e.to_string()),
        }
    }

    /// Handle a slash command.
    async fn handle_slash_command(&mut self, input: &str) -> Result<ControlFlow> {
        let parts: Vec<&str> = input[1..].split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");
        let args = &parts[1..];

        match cmd {
            "quit" | "q" | "exit" => {
                return Ok(ControlFlow::Exit);
            }
            "help" | "h" | "?" => {
                self.print_help();
            }
            "clear" => {
                self.session.clear_conversation();
                self.print_dim("Conversation cleared");
            }
            "cls" => {
                self.term.clear_screen()?;
            }
            "history" => {
                self.print_history();
            }
            "retry" => match self.session.resume(None).await {
                Ok(answer) => {
                    println!();
                    println!("{}", answer);
                    println!();
                }
                Err(e) => self.print_error(&e.to_string()),
            },
            "health" => {
                self.print_health().await;
            }
            "tools" => {
                self.print_tools();
            }
            "context" if args.is_empty() => {
                self.print_context();
            }
            "context" => {
                let pairs: Vec<String> = args.iter().map(|s| s.to_string()).collect();
                for (key, value) in super::parse_context(&pairs)? {
                    self.session.set_context(key, value);
                }
                self.print_dim("Context updated");
            }
            "" => {
                self.print_dim("Type /help for available commands");
            }
            _ => {
                self.print_error(&format!("Unknown command: /{}", cmd));
                self.print_dim("Type /help for available commands");
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Docent Chat").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!(
            "{}",
            dim.apply_to("Type your question and press Enter.")
        );
        println!(
            "{}",
            dim.apply_to("Use /help for commands, Ctrl+D to exit.")
        );
        if !self.session.gateway().is_connected() {
            let reason = self
                .session
                .gateway()
                .disconnect_reason()
                .unwrap_or("disabled");
            println!(
                "{}",
                Style::new()
                    .yellow()
                    .apply_to(format!("Tool server unavailable ({}); answering without tools.", reason))
            );
        }
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit the REPL", style("/quit, /q").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Forget the conversation", style("/clear").cyan());
        println!("  {}  - Clear the screen", style("/cls").cyan());
        println!("  {}  - Show the conversation", style("/history").cyan());
        println!("  {}  - Retry after a failed turn", style("/retry").cyan());
        println!("  {}  - Check the API and tool server", style("/health").cyan());
        println!("  {}  - List available tools", style("/tools").cyan());
        println!(
            "  {}  - Show or set prompt context",
            style("/context [key=value ...]").cyan()
        );
        println!();
        println!("{}", dim.apply_to("Keyboard shortcuts:"));
        println!("  {} - Cancel the current line", dim.apply_to("Ctrl+C"));
        println!("  {} - Exit the REPL", dim.apply_to("Ctrl+D"));
        println!();
    }

    fn print_history(&self) {
        let messages = self.session.get_conversation();
        if messages.is_empty() {
            self.print_dim("No messages yet");
            return;
        }
        let dim = Style::new().dim();
        for message in &messages {
            let label = match message.role {
                Role::User => style("you").green().to_string(),
                Role::Assistant => style("docent").cyan().to_string(),
                Role::Tool => dim.apply_to("tool").to_string(),
                Role::System => dim.apply_to("system").to_string(),
            };
            let mut text = message.content.replace('\n', " ");
            if text.chars().count() > HISTORY_PREVIEW_CHARS && !self.verbose {
                text = text.chars().take(HISTORY_PREVIEW_CHARS).collect::<String>() + "...";
            }
            if message.has_tool_calls() {
                let names: Vec<&str> = message
                    .tool_calls
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect();
                text = format!("{} [calls: {}]", text, names.join(", "));
            }
            println!("{}: {}", label, text);
        }
        let budget = self.session.budget();
        println!(
            "{}",
            dim.apply_to(format!("{} / {} tokens", budget.tokens, budget.limit))
        );
    }

    async fn print_health(&mut self) {
        let report = self.session.health_check().await;
        let line = |name: &str, status: &HealthStatus| match status {
            HealthStatus::Healthy => {
                println!("{}: {}", name, Style::new().green().apply_to("● healthy"))
            }
            HealthStatus::Unhealthy(reason) => println!(
                "{}: {} {}",
                name,
                Style::new().red().apply_to("● unhealthy"),
                Style::new().dim().apply_to(format!("({})", reason))
            ),
        };
        line("Completion API", &report.completion_api);
        line("Tool server", &report.tool_server);
    }

    fn print_tools(&self) {
        let tools = self.session.list_tools();
        if tools.is_empty() {
            self.print_dim("No tools available");
            return;
        }
        let dim = Style::new().dim();
        for tool in tools {
            println!(
                "  {} {}",
                style(&tool.name).cyan(),
                dim.apply_to(tool.description)
            );
        }
    }

    fn print_context(&self) {
        let context = self.session.context();
        if context.is_empty() {
            self.print_dim("No context set");
            return;
        }
        for (key, value) in context {
            println!("  {}: {}", key, value);
        }
    }

    fn format_prompt(&self) -> String {
        format!("{} ", style("docent>").cyan().bold())
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}
