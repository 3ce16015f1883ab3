use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Token accounting reported by the endpoint.
///
/// The endpoint reports usage on a best-effort basis.  When it is absent, callers estimate it
/// with [`Usage::estimate`] instead of failing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,

    /// Tokens produced by the completion.
    #[serde(default)]
    pub completion_tokens: u64,

    /// Sum of prompt and completion tokens.
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    /// Create a new `Usage` with the given prompt and completion tokens.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Estimate usage locally by counting whitespace-delimited words.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self::new(
            prompt.split_whitespace().count() as u64,
            completion.split_whitespace().count() as u64,
        )
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}
