//! cadence - paced chat client for streaming backends

mod commands;
mod config;
mod printer;

use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use cadence_chat::{ChatConfig, ChatEngine, ChatEvent, ChatHandle, SessionOutcome};
use cadence_sse::{Script, ScriptedTransport, SseConfig, SseTransport, Transport};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    commands::{CommandResult, execute_command},
    config::Config,
    printer::Printer,
};

/// cadence - chat with a streaming backend, one bubble at a time
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL (default: http://localhost:8080)
    #[arg(short, long)]
    url: Option<String>,

    /// Segment delimiter (default: <chunk>)
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Milliseconds between bubbles (default: 500)
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Conversation id sent with every request
    #[arg(long)]
    chat_id: Option<String>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Print every event as a JSON line
    #[arg(long)]
    json: bool,

    /// Send the greeting prompt on startup
    #[arg(long)]
    greeting: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Check backend health and exit
    #[arg(long)]
    health: bool,

    /// Answer every prompt with the contents of this file instead of a backend
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Characters per replayed chunk
    #[arg(long, default_value_t = 16)]
    replay_chunk_size: usize,

    /// Milliseconds between replayed chunks
    #[arg(long, default_value_t = 40)]
    replay_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("cadence_cli=debug,cadence_chat=debug,cadence_sse=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let config = Config::load();
    let sse_config = SseConfig::with_base_url(
        args.url
            .clone()
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| cadence_sse::sse::DEFAULT_BASE_URL.to_string()),
    );
    sse_config.validate()?;

    if args.health {
        let transport = SseTransport::new(sse_config);
        let status = transport.check_health().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let chat_config = build_chat_config(&args, &config);
    let transport: Arc<dyn Transport> = match &args.replay {
        Some(path) => {
            let body = std::fs::read_to_string(path)?;
            tracing::debug!(path = %path.display(), chars = body.chars().count(), "replaying file");
            Arc::new(ScriptedTransport::repeating(Script::from_body(
                &body,
                args.replay_chunk_size,
                Duration::from_millis(args.replay_delay_ms),
            )))
        }
        None => Arc::new(SseTransport::new(sse_config)),
    };

    let handle = ChatEngine::spawn(chat_config, transport)?;
    let mut printer = Printer::new(std::io::stdout(), args.json);

    if let Some(command) = &args.command {
        return run_command(&handle, &mut printer, command).await;
    }

    let greeting = args.greeting || config.greeting.unwrap_or(false);
    run_interactive(&handle, &mut printer, greeting).await
}

fn build_chat_config(args: &Args, config: &Config) -> ChatConfig {
    let mut chat = ChatConfig::default();
    config.apply(&mut chat);
    if let Some(delimiter) = &args.delimiter {
        chat.delimiter = delimiter.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        chat.output_interval_ms = interval_ms;
    }
    if let Some(chat_id) = &args.chat_id {
        chat.chat_id = Some(chat_id.clone());
    }
    chat
}

async fn run_command<W: Write>(
    handle: &ChatHandle,
    printer: &mut Printer<W>,
    command: &str,
) -> anyhow::Result<()> {
    if !printer.is_json() {
        println!("cadence> {}", command);
        println!();
    }

    let mut events = handle.subscribe();
    handle.send(command).await?;

    loop {
        match events.recv().await {
            Ok(event) => {
                printer.handle(&event)?;
                if let ChatEvent::SessionFinished { outcome } = event {
                    handle.shutdown().await;
                    if outcome == SessionOutcome::Failed {
                        anyhow::bail!("the request failed");
                    }
                    return Ok(());
                }
            }
            Err(RecvError::Lagged(n)) => tracing::warn!("dropped {} events", n),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn run_interactive<W: Write>(
    handle: &ChatHandle,
    printer: &mut Printer<W>,
    greeting: bool,
) -> anyhow::Result<()> {
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("cadence (type /help for commands)");
        eprintln!();
    }

    if greeting {
        handle.send_initial_message().await?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // EOF: let the last reply finish before exiting.
                    handle.wait_for_idle().await;
                    while let Ok(event) = events.try_recv() {
                        printer.handle(&event)?;
                    }
                    break;
                };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match execute_command(input) {
                    Some(CommandResult::Clear) => {
                        handle.clear().await?;
                        println!("Cleared conversation.");
                    }
                    Some(CommandResult::Cancel) => {
                        if !handle.cancel().await? {
                            println!("Nothing is streaming.");
                        }
                    }
                    Some(CommandResult::Exit) => break,
                    Some(CommandResult::Message(msg)) => println!("{}", msg),
                    Some(CommandResult::Unknown(cmd)) => {
                        println!("Unknown command: /{}", cmd);
                        println!("Type /help for available commands.");
                    }
                    None => {
                        if let Err(e) = handle.send(input).await {
                            eprintln!("Error: {}", e);
                        }
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => printer.handle(&event)?,
                Err(RecvError::Lagged(n)) => tracing::warn!("dropped {} events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}
