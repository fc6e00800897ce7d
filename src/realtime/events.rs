//! Realtime protocol events: typed server events, client event builders, and
//! the ordered [`SessionEvent`] stream delivered to the console.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::Display;
use uuid::Uuid;

use super::conversation::{ConversationItem, ItemDelta};
use crate::audio::wav::pcm16_to_le_bytes;

/// Which side emitted a protocol event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Client,
    Server,
}

/// One protocol event as sent or received, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEventRecord {
    pub time: DateTime<Utc>,
    pub source: EventSource,
    pub event: Value,
}

impl RealtimeEventRecord {
    pub fn new(source: EventSource, event: Value) -> Self {
        Self {
            time: Utc::now(),
            source,
            event,
        }
    }

    pub fn event_type(&self) -> &str {
        self.event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Everything the console reacts to, delivered in session order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Every client and server protocol event.
    Realtime(RealtimeEventRecord),
    /// Server `error` event or transport failure. The session stays up.
    Error(Value),
    ConversationUpdated {
        item: ConversationItem,
        delta: Option<ItemDelta>,
    },
    /// The user started speaking over the assistant.
    ConversationInterrupted,
    /// The transport gave up; no further events follow.
    Closed,
}

/// A content block of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    InputText { text: String },
    /// Base64-encoded little-endian PCM16.
    InputAudio { audio: String },
}

impl ContentBlock {
    pub fn input_text(text: impl Into<String>) -> Self {
        Self::InputText { text: text.into() }
    }

    pub fn input_audio(samples: &[i16]) -> Self {
        Self::InputAudio {
            audio: BASE64.encode(pcm16_to_le_bytes(samples)),
        }
    }
}

/// Server events the conversation model understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    SessionCreated { session_id: String },
    ItemCreated { item: Value },
    ItemTruncated { item_id: String, audio_end_ms: u64 },
    ItemDeleted { item_id: String },
    InputTranscriptionCompleted { item_id: String, transcript: String },
    SpeechStarted { item_id: String, audio_start_ms: u64 },
    SpeechStopped { item_id: String, audio_end_ms: u64 },
    OutputItemDone { item: Value },
    ContentPartAdded { item_id: String, content_index: u32, part_type: String },
    AudioDelta { item_id: String, delta: String },
    AudioTranscriptDelta { item_id: String, delta: String },
    TextDelta { item_id: String, delta: String },
    FunctionCallArgumentsDelta { item_id: String, delta: String },
    Error { message: String },
    Unknown { event_type: String },
}

impl ServerEvent {
    /// Parse a server payload. `None` when the payload has no `type` or a
    /// known event is missing required fields.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let event_type = payload.get("type")?.as_str()?;
        let item_id = || string_field(payload, "item_id");
        let delta = || string_field(payload, "delta");
        match event_type {
            "session.created" => Some(Self::SessionCreated {
                session_id: string_at(payload, &["session", "id"])
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
            "conversation.item.created" => payload
                .get("item")
                .filter(|item| item.is_object())
                .map(|item| Self::ItemCreated { item: item.clone() }),
            "conversation.item.truncated" => Some(Self::ItemTruncated {
                item_id: item_id()?,
                audio_end_ms: u64_field(payload, "audio_end_ms").unwrap_or(0),
            }),
            "conversation.item.deleted" => Some(Self::ItemDeleted { item_id: item_id()? }),
            "conversation.item.input_audio_transcription.completed" => {
                Some(Self::InputTranscriptionCompleted {
                    item_id: item_id()?,
                    transcript: string_field(payload, "transcript").unwrap_or_default(),
                })
            }
            "input_audio_buffer.speech_started" => Some(Self::SpeechStarted {
                item_id: item_id()?,
                audio_start_ms: u64_field(payload, "audio_start_ms").unwrap_or(0),
            }),
            "input_audio_buffer.speech_stopped" => Some(Self::SpeechStopped {
                item_id: item_id()?,
                audio_end_ms: u64_field(payload, "audio_end_ms").unwrap_or(0),
            }),
            "response.output_item.done" => payload
                .get("item")
                .filter(|item| item.is_object())
                .map(|item| Self::OutputItemDone { item: item.clone() }),
            "response.content_part.added" => Some(Self::ContentPartAdded {
                item_id: item_id()?,
                content_index: u64_field(payload, "content_index").unwrap_or(0) as u32,
                part_type: string_at(payload, &["part", "type"]).unwrap_or_default(),
            }),
            "response.audio.delta" => Some(Self::AudioDelta {
                item_id: item_id()?,
                delta: delta()?,
            }),
            "response.audio_transcript.delta" => Some(Self::AudioTranscriptDelta {
                item_id: item_id()?,
                delta: delta()?,
            }),
            "response.text.delta" => Some(Self::TextDelta {
                item_id: item_id()?,
                delta: delta()?,
            }),
            "response.function_call_arguments.delta" => Some(Self::FunctionCallArgumentsDelta {
                item_id: item_id()?,
                delta: delta()?,
            }),
            "error" => Some(Self::Error {
                message: string_at(payload, &["error", "message"])
                    .or_else(|| string_field(payload, "message"))
                    .unwrap_or_else(|| "Realtime server error".to_string()),
            }),
            _ => Some(Self::Unknown {
                event_type: event_type.to_string(),
            }),
        }
    }
}

/// Builders for client events. Each carries a fresh `event_id`.
pub mod client {
    use super::*;

    fn event(event_type: &str, mut body: Value) -> Value {
        if let Value::Object(map) = &mut body {
            map.insert(
                "event_id".into(),
                Value::String(format!("evt_{}", Uuid::new_v4().simple())),
            );
            map.insert("type".into(), Value::String(event_type.to_string()));
        }
        body
    }

    pub fn session_update(session: Value) -> Value {
        event("session.update", json!({ "session": session }))
    }

    pub fn user_message(content: &[ContentBlock]) -> Value {
        event(
            "conversation.item.create",
            json!({
                "item": { "type": "message", "role": "user", "content": content }
            }),
        )
    }

    pub fn function_call_output(call_id: &str, output: &str) -> Value {
        event(
            "conversation.item.create",
            json!({
                "item": { "type": "function_call_output", "call_id": call_id, "output": output }
            }),
        )
    }

    pub fn item_delete(item_id: &str) -> Value {
        event("conversation.item.delete", json!({ "item_id": item_id }))
    }

    pub fn item_truncate(item_id: &str, content_index: u32, audio_end_ms: u64) -> Value {
        event(
            "conversation.item.truncate",
            json!({
                "item_id": item_id,
                "content_index": content_index,
                "audio_end_ms": audio_end_ms,
            }),
        )
    }

    pub fn input_audio_append(samples: &[i16]) -> Value {
        event(
            "input_audio_buffer.append",
            json!({ "audio": BASE64.encode(pcm16_to_le_bytes(samples)) }),
        )
    }

    pub fn input_audio_commit() -> Value {
        event("input_audio_buffer.commit", json!({}))
    }

    pub fn response_create() -> Value {
        event("response.create", json!({}))
    }

    pub fn response_cancel() -> Value {
        event("response.cancel", json!({}))
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn u64_field(value: &Value, field: &str) -> Option<u64> {
    value.get(field).and_then(Value::as_u64)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str().map(ToString::to_string)
}
