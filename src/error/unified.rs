//! Error classification and recovery hints.

/// Broad error category, used to decide how a failure surfaces to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid credential, bad settings.
    Configuration,
    /// The server rejected the credential.
    Authentication,
    /// WebSocket, HTTP, or protocol-level failure.
    Transport,
    /// A registered tool failed.
    Tool,
    /// Artifact encoding or playback failure.
    Audio,
    /// An operation was attempted in the wrong session state.
    State,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Ask the user for a (new) API key.
    PromptForCredentials,
    CheckConfiguration,
    /// Inspect the event log; the session stays up.
    InspectEventLog,
    Reconnect,
    /// Nothing to do; the failure degraded to a no-op.
    Ignore,
}
