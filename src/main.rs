//! realtime-console binary entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use realtime_console::audio::{PlaybackCommand, PlaybackFeed, StreamPlayer};
use realtime_console::cli::{Cli, Command};
use realtime_console::config::{ConsoleConfig, CredentialStore, FileCredentialStore, TurnMode};
use realtime_console::console::{format_elapsed, ConsoleController};
use realtime_console::error::Result;
use realtime_console::realtime::{SessionEvent, WebSocketTransport};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        if let Some(hint) = hint_for(&e) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

fn hint_for(error: &realtime_console::error::ConsoleError) -> Option<&'static str> {
    use realtime_console::error::RecoverySuggestion;
    match error.recovery_suggestion() {
        RecoverySuggestion::PromptForCredentials => {
            Some("Pass --api-key or set OPENAI_API_KEY.")
        }
        RecoverySuggestion::CheckConfiguration => Some("Check the config file and flags."),
        _ => None,
    }
}

enum Input {
    Line(std::io::Result<Option<String>>),
    Event(Option<SessionEvent>),
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ConsoleConfig::from_env();
    if let Some(path) = &cli.config {
        config = config.load_file(path)?;
    }
    if let Some(instructions) = cli.instructions {
        config.instructions = instructions;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if cli.vad {
        config.turn_mode = TurnMode::ServerVad;
    }

    let store = FileCredentialStore::new_default();
    if let Some(key) = cli.api_key {
        store.save(&key)?;
        config.api_key = Some(key);
    }
    let api_key = config.resolve_api_key(Some(&store))?;

    let transport = Arc::new(WebSocketTransport::new(&config, api_key)?);
    let (player, feed) = StreamPlayer::new(config.sample_rate);
    tokio::spawn(pace_playback(feed, config.sample_rate));

    let mut console = ConsoleController::new(config, transport, Box::new(player))?;
    console.connect().await?;
    println!("connected; type a message, /delete <id>, /vad, /manual, /items, /events, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line),
            event = console.process_next() => Input::Event(event),
        };
        match input {
            Input::Line(line) => {
                let Some(line) = line? else { break };
                if !handle_command(&mut console, Command::parse(&line))? {
                    break;
                }
            }
            Input::Event(None) | Input::Event(Some(SessionEvent::Closed)) => {
                println!("session closed");
                break;
            }
            Input::Event(Some(event)) => print_event(&console, &event),
        }
    }

    console.disconnect().await;
    Ok(())
}

/// Returns `false` to quit.
fn handle_command(console: &mut ConsoleController, command: Command) -> Result<bool> {
    match command {
        Command::Quit => return Ok(false),
        Command::Empty => {}
        Command::Say(text) => {
            console.set_input(text);
            console.submit_input()?;
        }
        Command::Delete(id) => {
            if !console.delete_item(&id)? {
                println!("no item {id}");
            }
        }
        Command::Vad => console.set_turn_mode(TurnMode::ServerVad)?,
        Command::Manual => console.set_turn_mode(TurnMode::Manual)?,
        Command::Instructions(text) => {
            console.update_instructions(text)?;
        }
        Command::Items => {
            for item in console.items() {
                let text = display_text(item);
                println!("{} [{} {}] {}", item.id, item.role, item.status, text);
            }
        }
        Command::Events => {
            for entry in console.events().entries() {
                let repeat = if entry.count > 1 {
                    format!(" ({})", entry.count)
                } else {
                    String::new()
                };
                println!(
                    "{} {} {}{}",
                    format_elapsed(entry.elapsed),
                    entry.record.source,
                    entry.event_type(),
                    repeat
                );
            }
        }
        Command::Unknown(line) => println!("unknown command: {line}"),
    }
    Ok(true)
}

fn display_text(item: &realtime_console::realtime::ConversationItem) -> String {
    let formatted = &item.formatted;
    if let Some(tool) = &formatted.tool {
        return format!("{}({})", tool.name, tool.arguments);
    }
    if let Some(output) = &formatted.output {
        return output.clone();
    }
    if !formatted.transcript.is_empty() {
        return formatted.transcript.clone();
    }
    formatted.text.clone()
}

fn print_event(console: &ConsoleController, event: &SessionEvent) {
    match event {
        SessionEvent::Error(error) => println!("error: {error}"),
        SessionEvent::ConversationInterrupted => println!("(interrupted)"),
        SessionEvent::ConversationUpdated { item, delta: None } => {
            // The snapshot carries the artifact handle.
            let item = console
                .items()
                .iter()
                .find(|snapshot| snapshot.id == item.id)
                .unwrap_or(item);
            let audio = match &item.formatted.file {
                Some(handle) if console.artifact_bytes(handle).is_some() => {
                    format!(" <{} bytes audio>", handle.byte_len)
                }
                _ => String::new(),
            };
            println!(
                "{} [{} {}] {}{}",
                item.id,
                item.role,
                item.status,
                display_text(item),
                audio
            );
        }
        _ => {}
    }
}

/// Stand-in for an output device: consumes frames at the real playback rate
/// so interrupts report a realistic offset.
async fn pace_playback(mut feed: PlaybackFeed, sample_rate: u32) {
    while let Some(command) = feed.next().await {
        if let PlaybackCommand::Frame { track_id, samples } = command {
            let seconds = samples.len() as f64 / f64::from(sample_rate);
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
            feed.consumed(&track_id, samples.len() as u64);
        }
    }
}
