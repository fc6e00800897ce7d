//! Convenience re-exports for common use.

pub use crate::audio::{
    encode_wav, ArtifactHandle, AudioSink, PlaybackCommand, PlaybackFeed, StreamPlayer,
    TrackOffset,
};
pub use crate::config::{ConsoleConfig, CredentialStore, FileCredentialStore, TurnMode};
pub use crate::console::{ConnectionState, ConsoleController, EventLog};
pub use crate::error::{ConsoleError, Result};
pub use crate::realtime::{
    ContentBlock, ConversationItem, ItemDelta, RealtimeClient, RealtimeTransport, SessionEvent,
    WebSocketTransport,
};
pub use crate::tools::{FunctionTool, Tool, ToolArguments, ToolParameters};
