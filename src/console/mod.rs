//! The console core: controller, event log, and playback reconciliation.

pub mod controller;
pub mod log;
pub mod playback;

pub use controller::{ConnectionState, ConsoleController};
pub use log::{format_elapsed, EventEntry, EventLog};
pub use playback::PlaybackReconciler;
