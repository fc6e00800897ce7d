//! Realtime voice console core.
//!
//! Drives a realtime speech session: a [`console::ConsoleController`] owns
//! the session, folds its events into a display log and a conversation
//! snapshot, streams assistant audio to an [`audio::AudioSink`], and turns
//! finished assistant audio into playable WAV artifacts.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use realtime_console::prelude::*;
//!
//! # async fn example() -> realtime_console::error::Result<()> {
//! let config = ConsoleConfig::from_env();
//! let api_key = config.resolve_api_key(None)?;
//! let transport = Arc::new(WebSocketTransport::new(&config, api_key)?);
//! let (player, _feed) = StreamPlayer::new(config.sample_rate);
//!
//! let mut console = ConsoleController::new(config, transport, Box::new(player))?;
//! console.connect().await?;
//! console.send_text("What's the weather in Oslo?")?;
//! while let Some(event) = console.process_next().await {
//!     if matches!(event, SessionEvent::Closed) {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod console;
pub mod error;
pub mod prelude;
pub mod realtime;
pub mod tools;

#[cfg(feature = "cli")]
pub mod cli;
