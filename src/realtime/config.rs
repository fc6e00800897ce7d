//! Realtime session configuration (`session.update` payload).

use serde::Serialize;
use serde_json::Value;

use crate::config::TurnMode;
use crate::error::Result;
use crate::tools::ToolDefinition;

const PCM16: &str = "pcm16";

/// Input transcription settings; when set, user speech is echoed back as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionSettings {
    pub model: String,
}

/// Server-side voice activity detection settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_padding_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_duration_ms: Option<u32>,
}

impl TurnDetection {
    pub fn server_vad() -> Self {
        Self {
            kind: "server_vad",
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }

    /// Map a console turn mode; manual mode disables server detection.
    pub fn for_mode(mode: TurnMode) -> Option<Self> {
        match mode {
            TurnMode::Manual => None,
            TurnMode::ServerVad => Some(Self::server_vad()),
        }
    }
}

/// Full session configuration, resent whole on every update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: Option<TranscriptionSettings>,
    pub turn_detection: Option<TurnDetection>,
    pub tool_choice: String,
    pub temperature: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            modalities: vec!["text".into(), "audio".into()],
            instructions: String::new(),
            voice: "alloy".into(),
            input_audio_format: PCM16.into(),
            output_audio_format: PCM16.into(),
            input_audio_transcription: None,
            turn_detection: None,
            tool_choice: "auto".into(),
            temperature: 0.8,
        }
    }
}

impl SessionConfig {
    pub fn turn_mode(&self) -> TurnMode {
        if self.turn_detection.is_some() {
            TurnMode::ServerVad
        } else {
            TurnMode::Manual
        }
    }

    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(instructions) = update.instructions {
            self.instructions = instructions;
        }
        if let Some(voice) = update.voice {
            self.voice = voice;
        }
        if let Some(transcription) = update.input_audio_transcription {
            self.input_audio_transcription = Some(transcription);
        }
        if let Some(mode) = update.turn_mode {
            self.turn_detection = TurnDetection::for_mode(mode);
        }
    }

    /// Serialize into the `session` object, with the registered tools.
    pub fn to_payload(&self, tools: Vec<ToolDefinition>) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("tools".into(), serde_json::to_value(tools)?);
        }
        Ok(value)
    }
}

/// Partial update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub instructions: Option<String>,
    pub voice: Option<String>,
    pub input_audio_transcription: Option<TranscriptionSettings>,
    pub turn_mode: Option<TurnMode>,
}
