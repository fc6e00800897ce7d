//! Error types for the realtime console.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all console operations.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Realtime session is not connected")]
    NotConnected,
}

impl ConsoleError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                _ => ErrorCategory::Transport,
            },
            Self::Network(_) | Self::Io(_) | Self::Serialization(_) | Self::Stream(_) => {
                ErrorCategory::Transport
            }
            Self::ToolExecution { .. } => ErrorCategory::Tool,
            Self::Audio(_) => ErrorCategory::Audio,
            Self::InvalidState(_) | Self::NotConnected => ErrorCategory::State,
        }
    }

    /// No console failure takes the process down; everything degrades to a
    /// log entry or a no-op.
    pub fn is_fatal(&self) -> bool {
        false
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::PromptForCredentials,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Transport | ErrorCategory::Tool | ErrorCategory::Audio => {
                RecoverySuggestion::InspectEventLog
            }
            ErrorCategory::State => match self {
                Self::NotConnected => RecoverySuggestion::Reconnect,
                _ => RecoverySuggestion::Ignore,
            },
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ConsoleError>;
