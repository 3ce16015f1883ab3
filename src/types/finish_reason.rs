use serde::{Deserialize, Serialize};

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model reached a natural stopping point or a stop sequence.
    Stop,

    /// The reply hit the token limit.
    Length,

    /// The reply was withheld by a content filter.
    ContentFilter,

    /// The model requested tool calls.
    ToolCalls,

    /// The upstream provider failed while generating.
    Error,

    /// Any reason this crate does not know about.
    #[serde(other)]
    Other,
}
