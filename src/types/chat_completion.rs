use serde::{Deserialize, Serialize};

use crate::types::{FinishReason, Role, Usage};

/// The assistant message inside a non-streaming choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Role of the author; always `assistant` in practice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// The reply text.  Some providers send `null` for an empty reply.
    #[serde(default)]
    pub content: Option<String>,
}

/// One alternative reply of a non-streaming completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// The reply.
    #[serde(default)]
    pub message: ResponseMessage,

    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Body of a successful non-streaming `POST /chat/completions` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Generation identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that actually served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Alternative replies; only the first one is used.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Token accounting, when the endpoint reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Content of the first choice.
    ///
    /// Returns `None` when there are no choices.  A `null` content is an empty reply.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_deref().unwrap_or(""))
    }
}
