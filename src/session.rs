//! Conversation sessions.
//!
//! A [`ChatSession`] owns the conversation history and drives one turn at a time against a
//! [`Transport`]: append the user message, send the whole history, stream (or buffer) the
//! reply, append the assistant message, and trim.

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{ApiKeyProvider, Attribution, HttpTransport, Transport};
use crate::error::{Error, Result, Stage};
use crate::history::History;
use crate::observability::{
    SESSION_TURN_DURATION, SESSION_TURN_FAILURES, SESSION_TURNS, STREAM_DURATION,
};
use crate::sse;
use crate::types::{ChatCompletion, ChatRequest, FinishReason, Message, Usage};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
/// Number of non-system messages kept in history by default.
pub const DEFAULT_MAX_TURNS: usize = 10;
/// Application URL sent as `HTTP-Referer` by default.
pub const DEFAULT_APP_URL: &str = "https://github.com/routerchat/routerchat";
/// Application name sent as `X-Title` by default.
pub const DEFAULT_APP_NAME: &str = "AI Chat CLI";

/// What happens to the user message of a turn that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailedTurnPolicy {
    /// Keep the user message; the next turn sends it again as context.
    #[default]
    Retain,
    /// Remove the user message so history looks as if the turn never happened.
    Rollback,
}

/// Everything a session needs at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Model identifier, e.g. `openai/gpt-4o`.
    pub model: String,
    /// The pinned system message.
    pub system_prompt: String,
    /// Sliding-window size for non-system messages.
    pub max_turns: usize,
    /// Treatment of the user message when a turn fails.
    pub failed_turn_policy: FailedTurnPolicy,
    /// Override of the API root.
    pub base_url: Option<String>,
    /// Attribution headers.
    pub attribution: Attribution,
    /// How long to wait for response headers.
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            failed_turn_policy: FailedTurnPolicy::default(),
            base_url: None,
            attribution: Attribution::new(DEFAULT_APP_URL, DEFAULT_APP_NAME),
            timeout: None,
        }
    }
}

impl SessionConfig {
    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set the history window.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the failed-turn policy.
    pub fn with_failed_turn_policy(mut self, policy: FailedTurnPolicy) -> Self {
        self.failed_turn_policy = policy;
        self
    }

    /// Set the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the attribution headers.
    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    /// Set how long to wait for response headers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Statistics for a single completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnStats {
    /// Whether the reply was streamed.
    pub streamed: bool,
    /// Fragments delivered to the sink; zero for non-streaming turns.
    pub fragments: u64,
    /// Malformed events the decoder skipped.
    pub skipped_chunks: u64,
    /// Token usage, reported or estimated.
    pub usage: Usage,
    /// True when `usage` is a local estimate.
    pub usage_estimated: bool,
    /// Why the model stopped, if it said.
    pub finish_reason: Option<FinishReason>,
    /// Wall-clock time from sending the user message to the end of the reply.
    pub elapsed: Duration,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The number of messages in history, including the system message.
    pub message_count: usize,
    /// The history window.
    pub max_turns: usize,
    /// Turns completed since the session started or was reset.
    pub turns: u64,
    /// Turns that returned an error.
    pub failed_turns: u64,
    /// Total usage across completed turns.
    pub usage: Usage,
    /// True when any part of `usage` was estimated.
    pub usage_estimated: bool,
    /// Mean wall-clock time per completed turn.
    pub average_response_time: Option<Duration>,
    /// Malformed events skipped across all turns.
    pub skipped_chunks: u64,
    /// Time since the session started or was reset.
    pub session_age: Duration,
    /// Statistics for the most recent completed turn.
    pub last_turn: Option<TurnStats>,
}

/// A conversation with one model through one transport.
pub struct ChatSession<T: Transport = HttpTransport> {
    transport: T,
    model: String,
    history: History,
    failed_turn_policy: FailedTurnPolicy,
    started: Instant,
    turns: u64,
    failed_turns: u64,
    usage: Usage,
    usage_estimated: bool,
    response_time: Duration,
    skipped_chunks: u64,
    last_turn: Option<TurnStats>,
}

impl ChatSession<HttpTransport> {
    /// Create a session against the OpenRouter API with default settings.
    pub fn new(
        model: impl Into<String>,
        api_key: impl ApiKeyProvider + 'static,
        attribution: Attribution,
    ) -> Result<Self> {
        let config = SessionConfig::default()
            .with_model(model)
            .with_attribution(attribution);
        Self::from_config(api_key, config)
    }

    /// Create a session against the OpenRouter API from a full configuration.
    pub fn from_config(
        api_key: impl ApiKeyProvider + 'static,
        config: SessionConfig,
    ) -> Result<Self> {
        let transport = HttpTransport::with_options(
            api_key,
            config.attribution.clone(),
            config.base_url.clone(),
            config.timeout,
        )?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> ChatSession<T> {
    /// Create a session over any transport.
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            model: config.model,
            history: History::new(config.system_prompt, config.max_turns),
            failed_turn_policy: config.failed_turn_policy,
            started: Instant::now(),
            turns: 0,
            failed_turns: 0,
            usage: Usage::default(),
            usage_estimated: false,
            response_time: Duration::ZERO,
            skipped_chunks: 0,
            last_turn: None,
        }
    }

    /// The transport this session sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `text` and stream the reply, calling `sink` with every fragment in order.
    ///
    /// Returns the assembled reply, which is exactly the concatenation of the fragments.
    pub async fn ask<F>(&mut self, text: &str, sink: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        self.ask_cancellable(text, &CancellationToken::new(), sink)
            .await
    }

    /// Like [`ChatSession::ask`], abandoning the turn when `cancel` fires.
    pub async fn ask_cancellable<F>(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
        mut sink: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let start = Instant::now();
        let mark = self.history.len();
        self.history.push(Message::user(text));
        match self.stream_reply(cancel, &mut sink).await {
            Ok((reply, usage, stats)) => Ok(self.complete_turn(text, reply, usage, stats, start)),
            Err(err) => Err(self.fail_turn(mark, err)),
        }
    }

    /// Send `text` and wait for the whole reply.
    pub async fn ask_sync(&mut self, text: &str) -> Result<String> {
        self.ask_sync_cancellable(text, &CancellationToken::new())
            .await
    }

    /// Like [`ChatSession::ask_sync`], abandoning the turn when `cancel` fires.
    pub async fn ask_sync_cancellable(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let start = Instant::now();
        let mark = self.history.len();
        self.history.push(Message::user(text));
        match self.buffered_reply(cancel).await {
            Ok((reply, usage, stats)) => Ok(self.complete_turn(text, reply, usage, stats, start)),
            Err(err) => Err(self.fail_turn(mark, err)),
        }
    }

    async fn stream_reply<F>(
        &self,
        cancel: &CancellationToken,
        sink: &mut F,
    ) -> Result<(String, Option<Usage>, TurnStats)>
    where
        F: FnMut(&str),
    {
        let request = self.request(true);
        let response = self.transport.send(&request, cancel).await?;

        let start = Instant::now();
        let mut fragments = sse::decode(response.body);
        let mut reply = String::new();
        let mut delivered = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(Error::abort(
                        "turn cancelled while streaming the reply",
                        Stage::Stream,
                    ));
                }
                next = fragments.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    sink(&fragment);
                    reply.push_str(&fragment);
                    delivered += 1;
                }
                Some(Err(err)) => return Err(err),
                None => break,
            }
        }
        STREAM_DURATION.add(start.elapsed().as_secs_f64());

        let stats = TurnStats {
            streamed: true,
            fragments: delivered,
            skipped_chunks: fragments.skipped_chunks(),
            usage: Usage::default(),
            usage_estimated: false,
            finish_reason: fragments.finish_reason(),
            elapsed: Duration::ZERO,
        };
        Ok((reply, fragments.usage(), stats))
    }

    async fn buffered_reply(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(String, Option<Usage>, TurnStats)> {
        let request = self.request(false);
        let response = self.transport.send(&request, cancel).await?;
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::abort("turn cancelled while reading the reply", Stage::Stream));
            }
            body = response.bytes() => body?,
        };

        let completion: ChatCompletion = serde_json::from_slice(&body).map_err(|e| {
            Error::decode(format!("Failed to parse chat completion: {e}"), Some(Box::new(e)))
        })?;
        let reply = completion
            .first_content()
            .ok_or_else(|| Error::decode("chat completion contained no choices", None))?
            .to_string();

        let stats = TurnStats {
            streamed: false,
            fragments: 0,
            skipped_chunks: 0,
            usage: Usage::default(),
            usage_estimated: false,
            finish_reason: completion.choices.first().and_then(|c| c.finish_reason),
            elapsed: Duration::ZERO,
        };
        Ok((reply, completion.usage, stats))
    }

    fn request(&self, stream: bool) -> ChatRequest {
        ChatRequest::new(self.model.clone(), self.history.as_slice().to_vec()).with_stream(stream)
    }

    fn complete_turn(
        &mut self,
        prompt: &str,
        reply: String,
        usage: Option<Usage>,
        mut stats: TurnStats,
        start: Instant,
    ) -> String {
        self.history.push(Message::assistant(reply.clone()));
        self.history.trim();

        stats.elapsed = start.elapsed();
        match usage {
            Some(usage) => stats.usage = usage,
            None => {
                stats.usage = Usage::estimate(prompt, &reply);
                stats.usage_estimated = true;
            }
        }

        self.turns += 1;
        self.usage = self.usage + stats.usage;
        self.usage_estimated |= stats.usage_estimated;
        self.response_time += stats.elapsed;
        self.skipped_chunks += stats.skipped_chunks;

        SESSION_TURNS.click();
        SESSION_TURN_DURATION.add(stats.elapsed.as_secs_f64());
        tracing::debug!(
            model = %self.model,
            streamed = stats.streamed,
            fragments = stats.fragments,
            skipped_chunks = stats.skipped_chunks,
            reply_bytes = reply.len(),
            history = self.history.len(),
            "turn complete"
        );

        self.last_turn = Some(stats);
        reply
    }

    fn fail_turn(&mut self, mark: usize, err: Error) -> Error {
        self.failed_turns += 1;
        SESSION_TURN_FAILURES.click();
        if self.failed_turn_policy == FailedTurnPolicy::Rollback {
            self.history.truncate(mark);
        }
        tracing::debug!(
            model = %self.model,
            policy = ?self.failed_turn_policy,
            history = self.history.len(),
            error = %err,
            "turn failed"
        );
        err
    }

    /// Start over with only the system message and fresh statistics.
    pub fn reset(&mut self) {
        let had_turns = self.history.has_turns();
        self.history.reset();
        self.started = Instant::now();
        self.turns = 0;
        self.failed_turns = 0;
        self.usage = Usage::default();
        self.usage_estimated = false;
        self.response_time = Duration::ZERO;
        self.skipped_chunks = 0;
        self.last_turn = None;
        tracing::info!(model = %self.model, had_turns, "session reset");
    }

    /// Read-only view of the conversation, system message first.
    pub fn history(&self) -> &[Message] {
        self.history.as_slice()
    }

    /// Switch models; the change applies to the next turn.
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(from = %self.model, to = %model, "switching model");
        self.model = model;
    }

    /// The current model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The pinned system prompt.
    pub fn system_prompt(&self) -> &str {
        self.history.system_prompt()
    }

    /// The history window.
    pub fn max_turns(&self) -> usize {
        self.history.max_turns()
    }

    /// The failed-turn policy.
    pub fn failed_turn_policy(&self) -> FailedTurnPolicy {
        self.failed_turn_policy
    }

    /// Get the stats for the session.
    pub fn stats(&self) -> SessionStats {
        let average_response_time = if self.turns > 0 {
            u32::try_from(self.turns)
                .ok()
                .map(|turns| self.response_time / turns)
        } else {
            None
        };
        SessionStats {
            model: self.model.clone(),
            message_count: self.history.len(),
            max_turns: self.history.max_turns(),
            turns: self.turns,
            failed_turns: self.failed_turns,
            usage: self.usage,
            usage_estimated: self.usage_estimated,
            average_response_time,
            skipped_chunks: self.skipped_chunks,
            session_age: self.started.elapsed(),
            last_turn: self.last_turn.clone(),
        }
    }
}

/// Cancel `token` once `deadline` has elapsed.
///
/// The timer stops early if the token is cancelled some other way.
pub fn cancel_after(token: &CancellationToken, deadline: Duration) -> JoinHandle<()> {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}
