use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use streamchat::chat::StateReceiver;
use streamchat::{initialize_tool_registry, logging, ChatConfig, ChatOrchestrator, GeminiClient};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to talk to, overrides the config file.
    #[arg(short, long)]
    model: Option<String>,

    /// Path to a config file instead of the default location.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective settings (without the API key) to the config
    /// file and exit.
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let mut config = ChatConfig::load_from(path)?;
            config.apply_env();
            config
        }
        None => ChatConfig::load()?,
    };
    if let Some(model) = args.model {
        config.model = model;
    }

    if args.save_config {
        let settings = ChatConfig {
            api_key: None,
            ..config.clone()
        };
        let path = save_path(args.config);
        settings.save_to(&path)?;
        println!("Saved {}", path.display());
        return Ok(());
    }

    logging::init(&config.log_path(), &config.log_level)?;

    let backend = Arc::new(GeminiClient::from_config(&config)?);
    let orchestrator = ChatOrchestrator::with_options(
        backend,
        Arc::new(initialize_tool_registry()),
        config.orchestrator_options(),
    );

    println!("streamchat ({}), Ctrl-D to quit", config.model);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let mut rx = orchestrator.subscribe();
        if orchestrator.send_message(&line, None) {
            print_reply(&mut rx).await?;
        }
        prompt()?;
    }

    orchestrator.shutdown();
    Ok(())
}

/// `--save-config` writes back to the file given with `--config`, if any.
fn save_path(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(ChatConfig::config_path)
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Prints the in-flight model message as snapshots arrive.
async fn print_reply(rx: &mut StateReceiver) -> Result<()> {
    let mut shown = String::new();
    let mut last_hint: Option<String> = None;

    loop {
        let (content, hint, streaming) = {
            let state = rx.borrow_and_update();
            let last = state.last();
            (
                last.and_then(|m| m.content.clone()).unwrap_or_default(),
                last.and_then(|m| m.hint.clone()),
                state.is_streaming,
            )
        };

        if hint.is_some() && hint != last_hint && content.trim().is_empty() {
            println!("[{}]", hint.as_deref().unwrap_or_default());
        }
        last_hint = hint;

        match content.strip_prefix(shown.as_str()) {
            Some(delta) => print!("{}", delta),
            // the reply was replaced, e.g. by an error
            None => print!("\n{}", content),
        }
        std::io::stdout().flush()?;
        shown = content;

        if !streaming {
            println!();
            return Ok(());
        }
        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}
