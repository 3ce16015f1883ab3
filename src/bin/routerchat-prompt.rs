//! Send one-shot prompts through OpenRouter.
//!
//! Each file named on the command line is sent as a single user message in a
//! fresh conversation and the reply is printed.  With no files, the prompt is
//! read from stdin.
//!
//! # Usage
//!
//! ```bash
//! # Run a prompt file
//! routerchat-prompt my_prompt.txt
//!
//! # Pipe a prompt in and show token usage and timing
//! echo "Name three primes" | routerchat-prompt --verbose
//!
//! # Use a different model
//! routerchat-prompt --model anthropic/claude-sonnet-4 a.txt b.txt
//! ```

use std::io::Read;
use std::time::Duration;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tracing_subscriber::EnvFilter;

use routerchat::chat::ChatConfig;
use routerchat::{ChatSession, EnvApiKey};

/// Command-line arguments for the routerchat-prompt tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct Args {
    /// Model to use.
    #[arrrg(optional, "Model to use (default: openai/gpt-4o)", "MODEL")]
    model: Option<String>,

    /// System prompt for every file.
    #[arrrg(optional, "System prompt", "PROMPT")]
    system: Option<String>,

    /// Override of the API root.
    #[arrrg(optional, "API root (default: https://openrouter.ai/api/v1/)", "URL")]
    base_url: Option<String>,

    /// Seconds to wait for response headers.
    #[arrrg(optional, "Seconds to wait for a response to start (default: 60)", "SECONDS")]
    timeout: Option<u64>,

    /// Include timing and token usage information.
    #[arrrg(flag, "Include timing and token usage information")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, files) = Args::from_command_line_relaxed("routerchat-prompt [OPTIONS] [FILES]...");

    let mut config = ChatConfig::from_env_and_args(Default::default());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(system) = args.system {
        config = config.with_system_prompt(system);
    }
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(Duration::from_secs(timeout));
    }

    let prompts = if files.is_empty() {
        let mut prompt = String::new();
        std::io::stdin().read_to_string(&mut prompt)?;
        vec![("<stdin>".to_string(), prompt)]
    } else {
        let mut prompts = Vec::with_capacity(files.len());
        for file in &files {
            prompts.push((file.clone(), std::fs::read_to_string(file)?));
        }
        prompts
    };
    if prompts.iter().all(|(_, prompt)| prompt.trim().is_empty()) {
        eprintln!("Error: Must provide a non-empty prompt via files or stdin");
        std::process::exit(1);
    }

    let mut session = ChatSession::from_config(EnvApiKey, config.to_session_config())?;

    for (i, (name, prompt)) in prompts.iter().enumerate() {
        if prompts.len() > 1 {
            println!("=== {} ===", name);
        }

        session.reset();
        let reply = session.ask_sync(prompt.trim()).await?;

        if args.verbose {
            let stats = session.stats();
            println!("Model: {}", stats.model);
            if let Some(turn) = &stats.last_turn {
                println!("Duration: {:?}", turn.elapsed);
                let estimated = if turn.usage_estimated { " (estimated)" } else { "" };
                println!("Prompt tokens: {}{estimated}", turn.usage.prompt_tokens);
                println!("Completion tokens: {}{estimated}", turn.usage.completion_tokens);
                if let Some(reason) = turn.finish_reason {
                    println!("Finish reason: {:?}", reason);
                }
            }
            println!("---");
        }
        println!("{}", reply);

        if prompts.len() > 1 && i < prompts.len() - 1 {
            println!();
        }
    }

    Ok(())
}
