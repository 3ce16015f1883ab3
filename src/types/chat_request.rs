use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Body of a `POST /chat/completions` request.
///
/// A request is derived fresh from the session history for every call and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model identifier, e.g. `openai/gpt-4o`.
    pub model: String,

    /// The conversation so far, oldest first.
    pub messages: Vec<Message>,

    /// Whether the endpoint should stream the reply as server-sent events.
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new non-streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }

    /// Set the streaming flag.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}
