//! Shared test helpers: a scripted realtime transport, a recording audio
//! sink, and builders for server events.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use realtime_console::audio::{AudioSink, TrackOffset};
use realtime_console::error::{ConsoleError, Result};
use realtime_console::realtime::{RealtimeTransport, TransportFrame, TransportLink};

#[derive(Default)]
struct ScriptState {
    opens: usize,
    fail_next_open: bool,
    sent: Vec<Value>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Value>>,
    inbound_tx: Option<mpsc::UnboundedSender<TransportFrame>>,
}

/// In-memory transport. Tests push server events and inspect what the
/// client sent, bootstrap included.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_open(&self) {
        self.state.lock().unwrap().fail_next_open = true;
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// Deliver a server event to the open link.
    pub fn push(&self, event: Value) {
        self.push_frame(TransportFrame::Event(event));
    }

    pub fn push_frame(&self, frame: TransportFrame) {
        let state = self.state.lock().unwrap();
        state
            .inbound_tx
            .as_ref()
            .expect("no open link")
            .send(frame)
            .expect("link receiver dropped");
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<Value> {
        let mut state = self.state.lock().unwrap();
        let mut drained = Vec::new();
        if let Some(rx) = state.outbound_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
        }
        state.sent.extend(drained);
        state.sent.clone()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|event| event["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn sent_of_type(&self, event_type: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|event| event["type"] == event_type)
            .collect()
    }
}

#[async_trait]
impl RealtimeTransport for ScriptedTransport {
    async fn open(&self, bootstrap: Value) -> Result<TransportLink> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_open) {
            return Err(ConsoleError::Stream("scripted open failure".into()));
        }
        state.opens += 1;
        if let Some(mut previous) = state.outbound_rx.take() {
            while let Ok(event) = previous.try_recv() {
                state.sent.push(event);
            }
        }
        state.sent.push(bootstrap);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        state.outbound_rx = Some(outbound_rx);
        state.inbound_tx = Some(inbound_tx);
        Ok(TransportLink::new(outbound_tx, inbound_rx))
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub connected: bool,
    pub writes: Vec<(String, Vec<i16>)>,
    pub interrupts: usize,
    /// Returned by the next interrupt.
    pub next_interrupt: Option<TrackOffset>,
}

/// Audio sink that records writes.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt_with(&self, track_id: &str, offset: u64) {
        self.log.lock().unwrap().next_interrupt = Some(TrackOffset {
            track_id: track_id.to_string(),
            offset,
        });
    }

    pub fn writes(&self) -> Vec<(String, Vec<i16>)> {
        self.log.lock().unwrap().writes.clone()
    }

    pub fn writes_for(&self, track_id: &str) -> Vec<Vec<i16>> {
        self.writes()
            .into_iter()
            .filter(|(track, _)| track == track_id)
            .map(|(_, samples)| samples)
            .collect()
    }

    pub fn interrupts(&self) -> usize {
        self.log.lock().unwrap().interrupts
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn connect(&mut self) -> Result<()> {
        self.log.lock().unwrap().connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.log.lock().unwrap().connected
    }

    fn add_pcm16(&mut self, samples: &[i16], track_id: &str) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if !log.connected {
            return Err(ConsoleError::InvalidState("sink not connected".into()));
        }
        log.writes.push((track_id.to_string(), samples.to_vec()));
        Ok(())
    }

    async fn interrupt(&mut self) -> Option<TrackOffset> {
        let mut log = self.log.lock().unwrap();
        log.interrupts += 1;
        log.next_interrupt.take()
    }
}

pub fn assistant_created(item_id: &str) -> Value {
    json!({
        "type": "conversation.item.created",
        "item": {
            "id": item_id,
            "type": "message",
            "role": "assistant",
            "status": "in_progress",
            "content": []
        }
    })
}

pub fn audio_part_added(item_id: &str, content_index: u32) -> Value {
    json!({
        "type": "response.content_part.added",
        "item_id": item_id,
        "content_index": content_index,
        "part": { "type": "audio" }
    })
}

pub fn audio_delta(item_id: &str, samples: &[i16]) -> Value {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    json!({
        "type": "response.audio.delta",
        "item_id": item_id,
        "delta": BASE64.encode(bytes)
    })
}

pub fn item_done(item_id: &str, item_type: &str) -> Value {
    json!({
        "type": "response.output_item.done",
        "item": { "id": item_id, "type": item_type, "status": "completed" }
    })
}

pub fn speech_started(item_id: &str) -> Value {
    speech_started_at(item_id, 0)
}

pub fn speech_started_at(item_id: &str, audio_start_ms: u64) -> Value {
    json!({
        "type": "input_audio_buffer.speech_started",
        "item_id": item_id,
        "audio_start_ms": audio_start_ms
    })
}

pub fn speech_stopped(item_id: &str, audio_end_ms: u64) -> Value {
    json!({
        "type": "input_audio_buffer.speech_stopped",
        "item_id": item_id,
        "audio_end_ms": audio_end_ms
    })
}

pub fn user_created(item_id: &str) -> Value {
    json!({
        "type": "conversation.item.created",
        "item": {
            "id": item_id,
            "type": "message",
            "role": "user",
            "status": "completed",
            "content": []
        }
    })
}
