//! Conversation state folded from server events.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use super::events::ServerEvent;
use crate::audio::artifact::ArtifactHandle;
use crate::audio::wav::pcm16_from_le_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    User,
    Assistant,
    System,
    /// Function calls and their outputs.
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Message,
    FunctionCall,
    FunctionCallOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InProgress,
    Completed,
    #[serde(alias = "incomplete")]
    Truncated,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub call_id: String,
    /// Raw JSON arguments, accumulated from deltas.
    pub arguments: String,
}

/// Display-ready content of an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedContent {
    pub text: String,
    pub transcript: String,
    /// Accumulated PCM16 samples.
    pub audio: Vec<i16>,
    pub tool: Option<ToolCall>,
    pub output: Option<String>,
    /// Playable artifact, attached once the audio is complete.
    pub file: Option<ArtifactHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationItem {
    pub id: String,
    pub item_type: ItemType,
    pub role: ItemRole,
    pub status: ItemStatus,
    pub formatted: FormattedContent,
    /// Content index of the audio part, needed to truncate.
    pub audio_content_index: Option<u32>,
}

/// Incremental change carried by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDelta {
    Audio(Vec<i16>),
    Text(String),
    Transcript(String),
    Arguments(String),
}

/// Result of folding one server event.
#[derive(Debug, Clone, PartialEq)]
pub enum Fold {
    /// Nothing visible changed (or the event referenced an unknown item).
    Ignored,
    Interrupted,
    Updated {
        item: ConversationItem,
        delta: Option<ItemDelta>,
        /// The item just transitioned to completed.
        completed: bool,
    },
}

/// Ordered item list plus the bookkeeping needed to attach input audio and
/// transcripts that arrive before their item.
#[derive(Debug)]
pub struct Conversation {
    sample_rate: u32,
    items: Vec<ConversationItem>,
    /// Speech start offsets (ms) by user item.
    queued_speech: HashMap<String, u64>,
    queued_speech_audio: HashMap<String, Vec<i16>>,
    queued_transcripts: HashMap<String, String>,
    queued_input_audio: Option<Vec<i16>>,
    /// Session sample index of the first sample still buffered by the client.
    input_origin: usize,
}

impl Conversation {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            items: Vec::new(),
            queued_speech: HashMap::new(),
            queued_speech_audio: HashMap::new(),
            queued_transcripts: HashMap::new(),
            queued_input_audio: None,
            input_origin: 0,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.queued_speech.clear();
        self.queued_speech_audio.clear();
        self.queued_transcripts.clear();
        self.queued_input_audio = None;
        self.input_origin = 0;
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&ConversationItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ConversationItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Committed push-to-talk audio, attached to the next user message.
    pub fn queue_input_audio(&mut self, samples: Vec<i16>) {
        self.input_origin += samples.len();
        self.queued_input_audio = Some(samples);
    }

    /// Number of leading buffered samples no longer needed once speech
    /// ending at `audio_end_ms` has been sliced. The caller drains that many
    /// from the front of its buffer.
    pub fn release_input(&mut self, audio_end_ms: u64, buffered: usize) -> usize {
        let released = self
            .ms_to_samples(audio_end_ms)
            .saturating_sub(self.input_origin)
            .min(buffered);
        self.input_origin += released;
        released
    }

    fn ms_to_samples(&self, ms: u64) -> usize {
        (ms * u64::from(self.sample_rate) / 1000) as usize
    }

    /// Fold one server event. `input_audio` is the client's buffered
    /// microphone audio, sliced onto user items when speech stops.
    pub fn process(&mut self, event: &ServerEvent, input_audio: &[i16]) -> Fold {
        match event {
            ServerEvent::ItemCreated { item } => self.item_created(item),
            ServerEvent::ItemTruncated {
                item_id,
                audio_end_ms,
            } => {
                let end = self.ms_to_samples(*audio_end_ms);
                self.update(item_id, None, |item| {
                    item.formatted.transcript.clear();
                    item.formatted.audio.truncate(end);
                    item.status = ItemStatus::Truncated;
                })
            }
            ServerEvent::ItemDeleted { item_id } => {
                match self.items.iter().position(|item| &item.id == item_id) {
                    Some(index) => Fold::Updated {
                        item: self.items.remove(index),
                        delta: None,
                        completed: false,
                    },
                    None => unknown_item("conversation.item.deleted", item_id),
                }
            }
            ServerEvent::InputTranscriptionCompleted {
                item_id,
                transcript,
            } => {
                if self.get(item_id).is_none() {
                    self.queued_transcripts
                        .insert(item_id.clone(), transcript.clone());
                    return Fold::Ignored;
                }
                let shown = if transcript.is_empty() {
                    " ".to_string()
                } else {
                    transcript.clone()
                };
                self.update(
                    item_id,
                    Some(ItemDelta::Transcript(transcript.clone())),
                    |item| item.formatted.transcript = shown,
                )
            }
            ServerEvent::SpeechStarted {
                item_id,
                audio_start_ms,
            } => {
                self.queued_speech.insert(item_id.clone(), *audio_start_ms);
                Fold::Interrupted
            }
            ServerEvent::SpeechStopped {
                item_id,
                audio_end_ms,
            } => {
                let start_ms = self.queued_speech.get(item_id).copied().unwrap_or(0);
                if !input_audio.is_empty() {
                    let start = self
                        .ms_to_samples(start_ms)
                        .saturating_sub(self.input_origin)
                        .min(input_audio.len());
                    let end = self
                        .ms_to_samples(*audio_end_ms)
                        .saturating_sub(self.input_origin)
                        .clamp(start, input_audio.len());
                    self.queued_speech_audio
                        .insert(item_id.clone(), input_audio[start..end].to_vec());
                }
                Fold::Ignored
            }
            ServerEvent::OutputItemDone { item } => {
                let Some(id) = item.get("id").and_then(Value::as_str) else {
                    return Fold::Ignored;
                };
                let status = parse_field::<ItemStatus>(item, "status");
                let Some(found) = self.get_mut(id) else {
                    return unknown_item("response.output_item.done", id);
                };
                let was_completed = found.status == ItemStatus::Completed;
                if let Some(status) = status {
                    found.status = status;
                }
                Fold::Updated {
                    completed: !was_completed && found.status == ItemStatus::Completed,
                    item: found.clone(),
                    delta: None,
                }
            }
            ServerEvent::ContentPartAdded {
                item_id,
                content_index,
                part_type,
            } => {
                if part_type == "audio" {
                    if let Some(item) = self.get_mut(item_id) {
                        item.audio_content_index = Some(*content_index);
                    }
                }
                Fold::Ignored
            }
            ServerEvent::AudioDelta { item_id, delta } => {
                let samples = match BASE64.decode(delta) {
                    Ok(bytes) => pcm16_from_le_bytes(&bytes),
                    Err(error) => {
                        tracing::warn!(%item_id, %error, "undecodable audio delta");
                        return Fold::Ignored;
                    }
                };
                let appended = samples.clone();
                self.update(item_id, Some(ItemDelta::Audio(samples)), |item| {
                    item.formatted.audio.extend_from_slice(&appended)
                })
            }
            ServerEvent::AudioTranscriptDelta { item_id, delta } => {
                self.update(item_id, Some(ItemDelta::Transcript(delta.clone())), |item| {
                    item.formatted.transcript.push_str(delta)
                })
            }
            ServerEvent::TextDelta { item_id, delta } => {
                self.update(item_id, Some(ItemDelta::Text(delta.clone())), |item| {
                    item.formatted.text.push_str(delta)
                })
            }
            ServerEvent::FunctionCallArgumentsDelta { item_id, delta } => {
                self.update(item_id, Some(ItemDelta::Arguments(delta.clone())), |item| {
                    if let Some(tool) = item.formatted.tool.as_mut() {
                        tool.arguments.push_str(delta);
                    }
                })
            }
            ServerEvent::SessionCreated { .. }
            | ServerEvent::Error { .. }
            | ServerEvent::Unknown { .. } => Fold::Ignored,
        }
    }

    fn update(
        &mut self,
        item_id: &str,
        delta: Option<ItemDelta>,
        apply: impl FnOnce(&mut ConversationItem),
    ) -> Fold {
        match self.get_mut(item_id) {
            Some(item) => {
                apply(item);
                Fold::Updated {
                    item: item.clone(),
                    delta,
                    completed: false,
                }
            }
            None => unknown_item("item update", item_id),
        }
    }

    fn item_created(&mut self, raw: &Value) -> Fold {
        let Some(id) = raw.get("id").and_then(Value::as_str) else {
            return Fold::Ignored;
        };
        if let Some(existing) = self.get(id) {
            return Fold::Updated {
                item: existing.clone(),
                delta: None,
                completed: false,
            };
        }

        let item_type = parse_field::<ItemType>(raw, "type").unwrap_or(ItemType::Message);
        let mut formatted = FormattedContent::default();
        let (role, status) = match item_type {
            ItemType::Message => {
                let role = parse_field::<ItemRole>(raw, "role").unwrap_or(ItemRole::Assistant);
                for part in raw
                    .get("content")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        formatted.text.push_str(text);
                    }
                }
                if role == ItemRole::User {
                    if let Some(audio) = self.queued_speech_audio.remove(id) {
                        formatted.audio = audio;
                    } else if let Some(audio) = self.queued_input_audio.take() {
                        formatted.audio = audio;
                    }
                    self.queued_speech.remove(id);
                }
                if let Some(transcript) = self.queued_transcripts.remove(id) {
                    formatted.transcript = transcript;
                }
                let status =
                    parse_field::<ItemStatus>(raw, "status").unwrap_or(ItemStatus::InProgress);
                (role, status)
            }
            ItemType::FunctionCall => {
                formatted.tool = Some(ToolCall {
                    name: string_field(raw, "name"),
                    call_id: string_field(raw, "call_id"),
                    arguments: String::new(),
                });
                (ItemRole::Tool, ItemStatus::InProgress)
            }
            ItemType::FunctionCallOutput => {
                formatted.output = Some(string_field(raw, "output"));
                (ItemRole::Tool, ItemStatus::Completed)
            }
        };

        let item = ConversationItem {
            id: id.to_string(),
            item_type,
            role,
            status,
            formatted,
            audio_content_index: None,
        };
        self.items.push(item.clone());
        Fold::Updated {
            item,
            delta: None,
            completed: false,
        }
    }
}

fn unknown_item(context: &str, item_id: &str) -> Fold {
    tracing::debug!(%item_id, context, "event for unknown item ignored");
    Fold::Ignored
}

fn parse_field<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Option<T> {
    value
        .get(field)
        .cloned()
        .and_then(|raw| serde_json::from_value(raw).ok())
}

fn string_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
