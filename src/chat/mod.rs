//! Chat application module for interactive conversations through OpenRouter.
//!
//! This module provides the pieces of the `routerchat` REPL that sit around
//! the core [`ChatSession`](crate::ChatSession):
//!
//! - [`config`]: CLI argument parsing and configuration resolution
//! - [`commands`]: Slash command parsing and model selection
//! - [`render`]: Terminal output

mod commands;
mod config;
mod render;

pub use commands::{ChatCommand, help_text, parse_command, select_model};
pub use config::{APP_NAME_ENV, APP_URL_ENV, ChatArgs, ChatConfig, DEBUG_ENV, MODEL_ENV};
pub use render::{
    PlainTextRenderer, Renderer, format_history, format_model_list, format_stats, heading,
};
