//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

use crate::types::ModelInfo;

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the screen and show the banner again.
    Clear,

    /// Forget the conversation and start over.
    Reset,

    /// Show the current model, or switch to the named one.
    Model(Option<String>),

    /// List the model catalog and pick from it.
    Models,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics (message count, tokens, timing).
    Stats,

    /// Print the conversation so far.
    History,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use routerchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model openai/gpt-4o").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "reset" => ChatCommand::Reset,
        "model" => match argument {
            Some(model) if model.contains(char::is_whitespace) => {
                ChatCommand::Invalid("/model takes a single model id".to_string())
            }
            Some(model) => ChatCommand::Model(Some(model.to_string())),
            None => ChatCommand::Model(None),
        },
        "models" => ChatCommand::Models,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "history" => ChatCommand::History,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Resolve a selection from the model list.
///
/// `choice` is either a 1-based position in `models` or an exact model id.
pub fn select_model<'a>(models: &'a [ModelInfo], choice: &str) -> Result<&'a ModelInfo, String> {
    let choice = choice.trim();
    if let Ok(number) = choice.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| models.get(index))
            .ok_or_else(|| format!("invalid model number: {number}"));
    }
    models
        .iter()
        .find(|model| model.id == choice)
        .ok_or_else(|| format!("invalid model id: {choice}"))
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear the screen
  /reset                 Reset conversation history and statistics
  /model [id]            Show the current model, or switch (e.g., /model openai/gpt-4o)
  /models                List available models and select one
  /history               Show the conversation so far
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear_and_reset() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/reset"), Some(ChatCommand::Reset));
    }

    #[test]
    fn parse_model() {
        assert_eq!(parse_command("/model"), Some(ChatCommand::Model(None)));
        assert_eq!(
            parse_command("/model anthropic/claude-3.5-sonnet"),
            Some(ChatCommand::Model(Some("anthropic/claude-3.5-sonnet".to_string())))
        );
        assert_eq!(
            parse_command("/model   openai/gpt-4o  "),
            Some(ChatCommand::Model(Some("openai/gpt-4o".to_string())))
        );
        assert_eq!(
            parse_command("/model two words"),
            Some(ChatCommand::Invalid(
                "/model takes a single model id".to_string()
            ))
        );
        assert_eq!(parse_command("/models"), Some(ChatCommand::Models));
    }

    #[test]
    fn parse_stats_and_history() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello"), None);
        assert_eq!(parse_command("exit"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("what is 1/2?"), None);
    }

    fn catalog() -> Vec<ModelInfo> {
        serde_json::from_str(
            r#"[{"id": "anthropic/claude-3.5-sonnet"}, {"id": "openai/gpt-4o"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn select_by_number_or_id() {
        let models = catalog();
        assert_eq!(select_model(&models, "2").unwrap().id, "openai/gpt-4o");
        assert_eq!(
            select_model(&models, " anthropic/claude-3.5-sonnet ").unwrap().id,
            "anthropic/claude-3.5-sonnet"
        );
        assert_eq!(
            select_model(&models, "0").unwrap_err(),
            "invalid model number: 0"
        );
        assert_eq!(
            select_model(&models, "3").unwrap_err(),
            "invalid model number: 3"
        );
        assert_eq!(
            select_model(&models, "openai/gpt-5").unwrap_err(),
            "invalid model id: openai/gpt-5"
        );
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/models"));
        assert!(help.contains("/quit"));
    }
}
