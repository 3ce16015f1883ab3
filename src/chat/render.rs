//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows
//! for different output styles. The default implementation uses ANSI
//! escape codes for labels, errors and status lines.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crate::session::SessionStats;
use crate::types::{Message, ModelInfo, ModelPricing, Role};

/// ANSI escape code for dim text (used for timings).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for headings).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for the reply label).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for confirmations).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Replies slower than this get their timing printed.
const SLOW_REPLY: Duration = Duration::from_secs(2);

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Called before the first fragment of a reply.
    fn start_response(&mut self);

    /// Print a chunk of regular response text.
    ///
    /// This is called incrementally as fragments are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print a follow-up hint for the previous error.
    fn print_hint(&mut self, hint: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a confirmation.
    fn print_success(&mut self, message: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self, elapsed: Duration);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes to stdout by default; errors always go to stderr.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        self.flush();
    }

    /// Flushes output to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_response(&mut self) {
        let label = self.paint(ANSI_YELLOW, "AI >");
        let _ = write!(self.out, "\n{label} ");
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        let label = self.paint(ANSI_RED, "✗ Error:");
        eprintln!("\n{label} {error}");
    }

    fn print_hint(&mut self, hint: &str) {
        let arrow = self.paint(ANSI_RED, "  →");
        eprintln!("{arrow} {hint}");
    }

    fn print_info(&mut self, info: &str) {
        self.line(info);
    }

    fn print_success(&mut self, message: &str) {
        let check = self.paint(ANSI_GREEN, "✓");
        self.line(&format!("\n{check} {message}"));
    }

    fn finish_response(&mut self, elapsed: Duration) {
        let _ = writeln!(self.out);
        if elapsed > SLOW_REPLY {
            let timing = self.paint(ANSI_DIM, &format!("    ({:.1}s)", elapsed.as_secs_f64()));
            let _ = writeln!(self.out, "{timing}");
        }
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.line("\n[interrupted]");
    }
}

/// Format a heading for a block of output.
pub fn heading(text: &str, use_color: bool) -> String {
    if use_color {
        format!("{ANSI_CYAN}{text}{ANSI_RESET}")
    } else {
        text.to_string()
    }
}

/// Format session statistics for display.
pub fn format_stats(stats: &SessionStats) -> String {
    let estimated = if stats.usage_estimated { " (estimated)" } else { "" };
    let average = stats
        .average_response_time
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "n/a".to_string());
    let mut out = format!(
        "Session statistics:\n\
         \x20 Model:                 {}\n\
         \x20 Messages:              {} (window {})\n\
         \x20 Turns:                 {} completed, {} failed\n\
         \x20 Prompt tokens:         {}{estimated}\n\
         \x20 Completion tokens:     {}{estimated}\n\
         \x20 Total tokens:          {}{estimated}\n\
         \x20 Average response time: {average}\n\
         \x20 Skipped chunks:        {}\n\
         \x20 Session time:          {:.1} minutes",
        stats.model,
        stats.message_count,
        stats.max_turns,
        stats.turns,
        stats.failed_turns,
        stats.usage.prompt_tokens,
        stats.usage.completion_tokens,
        stats.usage.total_tokens,
        stats.skipped_chunks,
        stats.session_age.as_secs_f64() / 60.0,
    );
    if let Some(last) = &stats.last_turn {
        out.push_str(&format!(
            "\n  Last turn:             {} tokens in {:.2}s",
            last.usage.total_tokens,
            last.elapsed.as_secs_f64()
        ));
    }
    out
}

/// Format the model catalog as a numbered list.
pub fn format_model_list(models: &[ModelInfo]) -> String {
    let mut out = String::new();
    for (index, model) in models.iter().enumerate() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("{:>3}. {}", index + 1, model.id));
        if !model.name.is_empty() && model.name != model.id {
            out.push_str(&format!(" ({})", model.name));
        }
        if let Some(context) = model.context_length {
            out.push_str(&format!(" [{context} tokens]"));
        }
        if let (Some(prompt), Some(completion)) = (
            ModelPricing::per_million(&model.pricing.prompt),
            ModelPricing::per_million(&model.pricing.completion),
        ) {
            out.push_str(&format!(" ${prompt:.2}/${completion:.2} per 1M"));
        }
    }
    out
}

/// Format the conversation so far, one message per paragraph.
pub fn format_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let label = match message.role {
                Role::System => "system",
                Role::User => "you",
                Role::Assistant => "ai",
            };
            format!("[{label}] {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TurnStats;
    use crate::types::Usage;

    fn rendered(use_color: bool, f: impl FnOnce(&mut PlainTextRenderer<Vec<u8>>)) -> String {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), use_color);
        f(&mut renderer);
        String::from_utf8(renderer.writer().clone()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn plain_response() {
        let out = rendered(false, |r| {
            r.start_response();
            r.print_text("H");
            r.print_text("i");
            r.finish_response(Duration::from_millis(300));
        });
        assert_eq!(out, "\nAI > Hi\n");
    }

    #[test]
    fn slow_response_shows_timing() {
        let out = rendered(false, |r| {
            r.print_text("ok");
            r.finish_response(Duration::from_millis(3500));
        });
        assert_eq!(out, "ok\n    (3.5s)\n");
    }

    #[test]
    fn colored_label() {
        let out = rendered(true, |r| r.start_response());
        assert_eq!(out, "\n\x1b[33mAI >\x1b[0m ");
    }

    #[test]
    fn stats_mark_estimates() {
        let stats = SessionStats {
            model: "openai/gpt-4o".to_string(),
            message_count: 3,
            max_turns: 10,
            turns: 1,
            failed_turns: 0,
            usage: Usage::new(2, 5),
            usage_estimated: true,
            average_response_time: Some(Duration::from_millis(1500)),
            skipped_chunks: 1,
            session_age: Duration::from_secs(90),
            last_turn: Some(TurnStats {
                streamed: true,
                fragments: 4,
                skipped_chunks: 1,
                usage: Usage::new(2, 5),
                usage_estimated: true,
                finish_reason: None,
                elapsed: Duration::from_millis(1500),
            }),
        };
        let text = format_stats(&stats);
        assert!(text.contains("Model:                 openai/gpt-4o"));
        assert!(text.contains("Total tokens:          7 (estimated)"));
        assert!(text.contains("Average response time: 1.50s"));
        assert!(text.contains("Skipped chunks:        1"));
        assert!(text.contains("Session time:          1.5 minutes"));
        assert!(text.contains("Last turn:             7 tokens in 1.50s"));
    }

    #[test]
    fn model_list_is_numbered() {
        let models: Vec<ModelInfo> = serde_json::from_str(
            r#"[
                {"id": "a/one", "name": "One", "context_length": 8000,
                 "pricing": {"prompt": "0.000001", "completion": "0.000002"}},
                {"id": "b/two"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            format_model_list(&models),
            "  1. a/one (One) [8000 tokens] $1.00/$2.00 per 1M\n  2. b/two"
        );
    }

    #[test]
    fn history_labels_roles() {
        let text = format_history(&[
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);
        assert_eq!(text, "[system] be brief\n\n[you] hi\n\n[ai] hello");
    }
}
