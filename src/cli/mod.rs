//! Command-line front end for the console.

use std::path::PathBuf;

use clap::Parser;

/// Realtime voice console
#[derive(Parser, Debug)]
#[command(name = "realtime-console", version, about = "Realtime voice console")]
pub struct Cli {
    /// API key; saved to the local credential store when given
    #[arg(long)]
    pub api_key: Option<String>,

    /// System instructions for the session
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Let the server detect turns instead of push-to-talk
    #[arg(long)]
    pub vad: bool,

    /// Realtime model
    #[arg(short, long)]
    pub model: Option<String>,

    /// TOML config file overlaid on the environment
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Delete(String),
    Vad,
    Manual,
    Instructions(String),
    Items,
    Events,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("delete", id) if !id.is_empty() => Self::Delete(id.to_string()),
            ("instructions", text) if !text.is_empty() => Self::Instructions(text.to_string()),
            ("vad", "") => Self::Vad,
            ("manual", "") => Self::Manual,
            ("items", "") => Self::Items,
            ("events", "") => Self::Events,
            ("quit" | "exit", "") => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}
