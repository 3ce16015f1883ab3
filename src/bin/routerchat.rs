//! Interactive chat through OpenRouter.
//!
//! This binary provides a streaming REPL on top of [`routerchat::ChatSession`].
//!
//! # Usage
//!
//! ```bash
//! export OPENROUTER_API_KEY=sk-or-...
//!
//! # Basic usage with default settings
//! routerchat
//!
//! # Specify a model and a system prompt
//! routerchat --model anthropic/claude-sonnet-4 --system "You are a helpful coding assistant"
//!
//! # Wait for whole replies, without colors
//! routerchat --no-stream --no-color
//!
//! # Verify the key and connectivity
//! routerchat --check
//! ```
//!
//! `AI_MODEL`, `APP_URL`, `APP_NAME` and `DEBUG` are read from the environment;
//! flags win over the environment.  Ctrl+C while a reply is arriving cancels
//! that reply; Ctrl+D at the prompt exits.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use routerchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, format_history,
    format_model_list, format_stats, heading, help_text, parse_command, select_model,
};
use routerchat::{API_KEY_ENV, ApiKeyProvider, ChatSession, EnvApiKey, Error};

/// Main entry point for the routerchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("routerchat [OPTIONS]");
    let config = ChatConfig::from_env_and_args(args);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    if EnvApiKey.api_key().is_none_or(|key| key.trim().is_empty()) {
        renderer.print_error(&format!("{API_KEY_ENV} environment variable is not set"));
        renderer.print_hint(&format!("Linux/macOS: export {API_KEY_ENV}=\"your-key-here\""));
        renderer.print_hint(&format!("Windows: $env:{API_KEY_ENV}=\"your-key-here\""));
        std::process::exit(1);
    }

    let mut session = ChatSession::from_config(EnvApiKey, config.to_session_config())?;

    if config.check {
        match session.transport().check_connection().await {
            Ok(()) => {
                renderer.print_success(&format!("Connected to {}", session.transport().base_url()));
                return Ok(());
            }
            Err(err) => {
                report_error(&mut renderer, &err);
                std::process::exit(1);
            }
        }
    }

    let mut rl = DefaultEditor::new()?;

    // The token for the turn in flight; Ctrl+C cancels it.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let handler_token = current.clone();
    ctrlc::set_handler(move || {
        if let Ok(token) = handler_token.lock() {
            token.cancel();
        }
    })?;

    print_banner(&session, config.use_color);

    loop {
        let readline = rl.readline("You > ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(command) = parse_command(line) {
                    match command {
                        ChatCommand::Quit => {
                            print_farewell(&session);
                            break;
                        }
                        ChatCommand::Help => {
                            renderer.print_info(help_text());
                        }
                        ChatCommand::Clear => {
                            if config.use_color {
                                print!("\x1b[2J\x1b[H");
                            }
                            print_banner(&session, config.use_color);
                        }
                        ChatCommand::Reset => {
                            session.reset();
                            renderer.print_success("Conversation history reset!");
                        }
                        ChatCommand::Model(None) => {
                            renderer.print_info(&format!("Current model: {}", session.model()));
                        }
                        ChatCommand::Model(Some(model)) => {
                            session.set_model(model);
                            renderer.print_success(&format!("Selected model: {}", session.model()));
                        }
                        ChatCommand::Models => {
                            choose_model(&mut session, &mut rl, &mut renderer, config.use_color)
                                .await;
                        }
                        ChatCommand::Stats => {
                            renderer.print_info(&format_stats(&session.stats()));
                        }
                        ChatCommand::History => {
                            renderer.print_info(&format_history(session.history()));
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to API
                let cancel = CancellationToken::new();
                if let Ok(mut token) = current.lock() {
                    *token = cancel.clone();
                }
                let start = Instant::now();
                renderer.start_response();
                let outcome = if config.stream {
                    session
                        .ask_cancellable(line, &cancel, |fragment| renderer.print_text(fragment))
                        .await
                } else {
                    let reply = session.ask_sync_cancellable(line, &cancel).await;
                    if let Ok(reply) = &reply {
                        renderer.print_text(reply);
                    }
                    reply
                };
                match outcome {
                    Ok(_) => renderer.finish_response(start.elapsed()),
                    Err(err) if err.is_cancelled() => renderer.print_interrupted(),
                    Err(err) => report_error(&mut renderer, &err),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                print_farewell(&session);
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_banner(session: &ChatSession, use_color: bool) {
    let rule = heading(&"─".repeat(60), use_color);
    println!("{rule}");
    println!("{}", heading("routerchat", use_color));
    println!("Model:    {}", session.model());
    println!("Provider: OpenRouter");
    println!("Type /help for commands, /quit to exit");
    println!("{rule}");
}

fn print_farewell(session: &ChatSession) {
    let stats = session.stats();
    println!(
        "\nGoodbye! Final stats: {} messages, {} tokens, {:.1} minutes",
        stats.message_count,
        stats.usage.total_tokens,
        stats.session_age.as_secs_f64() / 60.0
    );
}

fn report_error(renderer: &mut impl Renderer, err: &Error) {
    renderer.print_error(&err.to_string());
    if err.is_authentication() || err.is_config() {
        renderer.print_hint(&format!("Check your {API_KEY_ENV} environment variable"));
    } else if err.is_rate_limit() {
        renderer.print_hint("Rate limit exceeded. Please wait and try again");
    } else if err.is_timeout() {
        renderer.print_hint("The request timed out; try --timeout with a larger value");
    }
}

async fn choose_model(
    session: &mut ChatSession,
    rl: &mut DefaultEditor,
    renderer: &mut impl Renderer,
    use_color: bool,
) {
    let models = match session.transport().list_models().await {
        Ok(models) => models,
        Err(err) => {
            report_error(renderer, &err);
            return;
        }
    };
    renderer.print_info(&heading("\nAvailable models:", use_color));
    renderer.print_info(&format_model_list(&models));

    let choice = match rl.readline("Model number or id (blank to keep current) > ") {
        Ok(choice) => choice,
        Err(_) => return,
    };
    if choice.trim().is_empty() {
        return;
    }
    match select_model(&models, &choice) {
        Ok(model) => {
            session.set_model(model.id.clone());
            renderer.print_success(&format!("Selected model: {}", model.id));
        }
        Err(message) => renderer.print_error(&message),
    }
}
