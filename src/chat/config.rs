//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.  Settings come from three places,
//! in increasing precedence: built-in defaults, the environment, and the
//! command line.

use std::env;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::Attribution;
use crate::session::{
    DEFAULT_APP_NAME, DEFAULT_APP_URL, DEFAULT_MAX_TURNS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT,
    FailedTurnPolicy, SessionConfig,
};

/// Default wait for response headers, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variable naming the model.
pub const MODEL_ENV: &str = "AI_MODEL";
/// Environment variable naming the application URL.
pub const APP_URL_ENV: &str = "APP_URL";
/// Environment variable naming the application.
pub const APP_NAME_ENV: &str = "APP_NAME";
/// Environment variable enabling debug logging when set to `true`.
pub const DEBUG_ENV: &str = "DEBUG";

/// Command-line arguments for the routerchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: openai/gpt-4o)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Number of non-system messages to keep.
    #[arrrg(optional, "Messages of history to keep (default: 10)", "N")]
    pub max_turns: Option<usize>,

    /// Application URL for attribution.
    #[arrrg(optional, "Application URL sent as HTTP-Referer", "URL")]
    pub app_url: Option<String>,

    /// Application name for attribution.
    #[arrrg(optional, "Application name sent as X-Title", "NAME")]
    pub app_name: Option<String>,

    /// Override of the API root.
    #[arrrg(optional, "API root (default: https://openrouter.ai/api/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Seconds to wait for response headers.
    #[arrrg(optional, "Seconds to wait for a response to start (default: 60)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Remove the user message when a turn fails.
    #[arrrg(flag, "Drop the user message from history when a turn fails")]
    pub rollback_failed_turns: bool,

    /// Wait for whole replies instead of streaming.
    #[arrrg(flag, "Disable streaming")]
    pub no_stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Enable debug logging.
    #[arrrg(flag, "Enable debug logging")]
    pub debug: bool,

    /// Verify connectivity and credentials, then exit.
    #[arrrg(flag, "Check the API connection and exit")]
    pub check: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// the environment and command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// System prompt pinned at the start of the conversation.
    pub system_prompt: String,

    /// Number of non-system messages kept in history.
    pub max_turns: usize,

    /// Application URL sent as `HTTP-Referer`.
    pub app_url: String,

    /// Application name sent as `X-Title`.
    pub app_name: String,

    /// Override of the API root.
    pub base_url: Option<String>,

    /// How long to wait for response headers.
    pub timeout: Duration,

    /// What to do with the user message of a failed turn.
    pub failed_turn_policy: FailedTurnPolicy,

    /// Whether to stream replies.
    pub stream: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to log at debug level.
    pub debug: bool,

    /// Check the connection and exit instead of chatting.
    pub check: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: openai/gpt-4o
    /// - History: 10 messages
    /// - Timeout: 60 seconds
    /// - Streaming and color: enabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            app_url: DEFAULT_APP_URL.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            failed_turn_policy: FailedTurnPolicy::Retain,
            stream: true,
            use_color: true,
            debug: false,
            check: false,
        }
    }

    /// Resolve configuration from the process environment, then `args`.
    pub fn from_env_and_args(args: ChatArgs) -> Self {
        Self::from_lookup_and_args(|key| env::var(key).ok(), args)
    }

    /// Resolve configuration from `lookup`, then `args`.
    ///
    /// Empty environment values count as unset.
    pub fn from_lookup_and_args<F>(lookup: F, args: ChatArgs) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = ChatConfig::new();
        if let Some(model) = get(MODEL_ENV) {
            config.model = model;
        }
        if let Some(app_url) = get(APP_URL_ENV) {
            config.app_url = app_url;
        }
        if let Some(app_name) = get(APP_NAME_ENV) {
            config.app_name = app_name;
        }
        if let Some(debug) = get(DEBUG_ENV) {
            config.debug = debug.eq_ignore_ascii_case("true") || debug == "1";
        }
        config.apply_args(args)
    }

    fn apply_args(mut self, args: ChatArgs) -> Self {
        if let Some(model) = args.model {
            self.model = model;
        }
        if let Some(system) = args.system {
            self.system_prompt = system;
        }
        if let Some(max_turns) = args.max_turns {
            self.max_turns = max_turns;
        }
        if let Some(app_url) = args.app_url {
            self.app_url = app_url;
        }
        if let Some(app_name) = args.app_name {
            self.app_name = app_name;
        }
        if args.base_url.is_some() {
            self.base_url = args.base_url;
        }
        if let Some(timeout) = args.timeout {
            self.timeout = Duration::from_secs(timeout);
        }
        if args.rollback_failed_turns {
            self.failed_turn_policy = FailedTurnPolicy::Rollback;
        }
        self.stream &= !args.no_stream;
        self.use_color &= !args.no_color;
        self.debug |= args.debug;
        self.check |= args.check;
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the history window.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Sets the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how long to wait for response headers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables streaming.
    pub fn without_streaming(mut self) -> Self {
        self.stream = false;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The attribution headers for this configuration.
    pub fn attribution(&self) -> Attribution {
        Attribution::new(self.app_url.clone(), self.app_name.clone())
    }

    /// The subset of this configuration the session needs.
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default()
            .with_model(self.model.clone())
            .with_system_prompt(self.system_prompt.clone())
            .with_max_turns(self.max_turns)
            .with_failed_turn_policy(self.failed_turn_policy)
            .with_attribution(self.attribution())
            .with_timeout(self.timeout);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        config
    }

    /// The default log filter for this configuration.
    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "warn" }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig::new().apply_args(args)
    }
}
