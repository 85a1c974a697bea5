//! Slash commands for interactive mode

/// Result of parsing a line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Stop the running reply
    Cancel,
    /// Exit the application
    Exit,
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command. Returns `None` for ordinary prompts.
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let command = rest.split_whitespace().next().unwrap_or("").to_lowercase();
    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "clear" | "c" => CommandResult::Clear,
        "cancel" | "stop" => CommandResult::Cancel,
        "quit" | "exit" | "q" => CommandResult::Exit,
        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /clear, /c           Clear the conversation
  /cancel, /stop       Stop the reply that is streaming
  /quit, /exit, /q     Exit"#
        .to_string()
}
