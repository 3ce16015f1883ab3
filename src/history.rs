//! Bounded conversation history.
//!
//! The first message is always the system prompt.  Everything after it is a sliding window of
//! at most `max_turns` user and assistant messages; older messages fall off the front.

use crate::types::{Message, Role};

/// Conversation history with a pinned system message.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    messages: Vec<Message>,
    max_turns: usize,
}

impl History {
    /// Create a history holding only `system_prompt`.
    pub fn new(system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            max_turns,
        }
    }

    /// Append a message without trimming.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Keep the system message plus the most recent `max_turns` messages.
    ///
    /// Calling this twice in a row is the same as calling it once.
    pub fn trim(&mut self) {
        let limit = 1 + self.max_turns;
        if self.messages.len() > limit {
            let excess = self.messages.len() - limit;
            self.messages.drain(1..1 + excess);
        }
    }

    /// Discard everything but a fresh system message.
    pub fn reset(&mut self) {
        let system = self.system_prompt().to_string();
        self.messages.clear();
        self.messages.push(Message::system(system));
    }

    /// Drop every message past `len`, never dropping the system message.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len.max(1));
    }

    /// The system prompt this history was created with.
    pub fn system_prompt(&self) -> &str {
        match self.messages.first() {
            Some(message) if message.role == Role::System => &message.content,
            _ => "",
        }
    }

    /// Maximum number of non-system messages retained.
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True once any user or assistant message follows the system message.
    pub fn has_turns(&self) -> bool {
        self.messages.len() > 1
    }

    /// Read-only view of every message in order.
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(max_turns: usize, count: usize) -> History {
        let mut history = History::new("be brief", max_turns);
        for i in 0..count {
            if i % 2 == 0 {
                history.push(Message::user(format!("q{i}")));
            } else {
                history.push(Message::assistant(format!("a{i}")));
            }
        }
        history
    }

    #[test]
    fn starts_with_system_message() {
        let history = History::new("be brief", 10);
        assert_eq!(history.as_slice(), &[Message::system("be brief")]);
        assert!(!history.has_turns());
        assert_eq!(history.system_prompt(), "be brief");
    }

    #[test]
    fn trim_keeps_system_and_most_recent() {
        let mut history = filled(4, 7);
        history.trim();
        assert_eq!(history.len(), 5);
        assert_eq!(history.as_slice()[0], Message::system("be brief"));
        let contents: Vec<&str> = history.as_slice()[1..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["a3", "q4", "a5", "q6"]);
    }

    #[test]
    fn trim_is_idempotent() {
        let mut history = filled(3, 9);
        history.trim();
        let once = history.clone();
        history.trim();
        assert_eq!(history, once);
    }

    #[test]
    fn trim_leaves_short_history_alone() {
        let mut history = filled(10, 4);
        let before = history.clone();
        history.trim();
        assert_eq!(history, before);
    }

    #[test]
    fn zero_turns_keeps_only_system() {
        let mut history = filled(0, 3);
        history.trim();
        assert_eq!(history.as_slice(), &[Message::system("be brief")]);
    }

    #[test]
    fn reset_and_truncate_never_drop_system() {
        let mut history = filled(10, 4);
        history.truncate(0);
        assert_eq!(history.len(), 1);

        let mut history = filled(10, 4);
        history.truncate(3);
        assert!(history.has_turns());
        assert_eq!(history.as_slice().last(), Some(&Message::assistant("a1")));

        history.reset();
        assert!(!history.has_turns());
        assert_eq!(history.as_slice(), &[Message::system("be brief")]);
    }
}
