//! Realtime voice session: protocol events, conversation state, the client,
//! and the transports it runs over.

pub mod client;
pub mod config;
pub mod conversation;
pub mod events;
pub mod transport;
pub mod websocket;

pub use client::RealtimeClient;
pub use config::{SessionConfig, SessionUpdate, TranscriptionSettings, TurnDetection};
pub use conversation::{
    Conversation, ConversationItem, FormattedContent, ItemDelta, ItemRole, ItemStatus, ItemType,
    ToolCall,
};
pub use events::{ContentBlock, EventSource, RealtimeEventRecord, ServerEvent, SessionEvent};
pub use transport::{RealtimeTransport, TransportFrame, TransportLink};
pub use websocket::WebSocketTransport;
