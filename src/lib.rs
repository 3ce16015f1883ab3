//! A streaming chat client for OpenRouter's chat-completions API.
//!
//! The core is three pieces: a [`Transport`] that sends one request and hands back the raw
//! response body, an event-stream decoder ([`sse::decode`]) that turns that body into text
//! fragments, and a [`ChatSession`] that keeps a bounded conversation history and runs turns.
//!
//! ```no_run
//! # async fn example() -> routerchat::Result<()> {
//! use routerchat::{Attribution, ChatSession, EnvApiKey};
//!
//! let attribution = Attribution::new("https://example.com", "Example");
//! let mut session = ChatSession::new("openai/gpt-4o", EnvApiKey, attribution)?;
//! let reply = session.ask("Say hi", |fragment| print!("{fragment}")).await?;
//! assert_eq!(session.history().last().map(|m| m.content.as_str()), Some(reply.as_str()));
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod history;
pub mod session;
pub mod sse;
pub mod types;

mod observability;

// Re-exports
pub use client::{
    API_KEY_ENV, ApiKeyProvider, Attribution, ByteStream, DEFAULT_API_URL, EnvApiKey,
    HttpTransport, Transport, TransportResponse,
};
pub use error::{Error, Result, Stage};
pub use history::History;
pub use observability::register_biometrics;
pub use session::{
    ChatSession, DEFAULT_APP_NAME, DEFAULT_APP_URL, DEFAULT_MAX_TURNS, DEFAULT_MODEL,
    DEFAULT_SYSTEM_PROMPT, FailedTurnPolicy, SessionConfig, SessionStats, TurnStats,
    cancel_after,
};
pub use sse::{Fragment, FragmentStream, SENTINEL, decode};
pub use types::*;
