//! Session controller: connection state machine and user actions.

use std::sync::Arc;

use strum::Display;

use super::log::EventLog;
use super::playback::PlaybackReconciler;
use crate::audio::{ArtifactHandle, AudioSink};
use crate::config::{ConsoleConfig, TurnMode};
use crate::error::{ConsoleError, Result};
use crate::realtime::{
    ContentBlock, ConversationItem, RealtimeClient, RealtimeTransport, SessionEvent,
    SessionUpdate, TranscriptionSettings,
};
use crate::tools::{weather_tool, MarkerState, SharedMarker, WEATHER_TOOL_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Owns the realtime client, the playback side, and everything the console
/// displays. All session mutation goes through here.
pub struct ConsoleController {
    config: ConsoleConfig,
    client: RealtimeClient,
    playback: PlaybackReconciler,
    events: EventLog,
    items: Vec<ConversationItem>,
    marker: SharedMarker,
    state: ConnectionState,
    input: String,
    talking: bool,
}

impl ConsoleController {
    pub fn new(
        config: ConsoleConfig,
        transport: Arc<dyn RealtimeTransport>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self> {
        config.validate()?;
        let mut controller = Self {
            client: RealtimeClient::new(transport, config.sample_rate),
            playback: PlaybackReconciler::new(sink, config.sample_rate),
            config,
            events: EventLog::new(),
            items: Vec::new(),
            marker: SharedMarker::default(),
            state: ConnectionState::Disconnected,
            input: String::new(),
            talking: false,
        };
        controller.setup()?;
        Ok(controller)
    }

    /// Push instructions, transcription, turn mode, and the weather tool
    /// into the session.
    fn setup(&mut self) -> Result<()> {
        self.client.remove_tool(WEATHER_TOOL_NAME);
        let tool = weather_tool(self.config.weather_base_url.clone(), self.marker.clone())?;
        self.client.add_tool(Arc::new(tool))?;
        self.client.update_session(SessionUpdate {
            instructions: Some(self.config.instructions.clone()),
            voice: self.config.voice.clone(),
            input_audio_transcription: Some(TranscriptionSettings {
                model: self.config.transcription_model.clone(),
            }),
            turn_mode: Some(self.config.turn_mode),
        })
    }

    /// Open the session and greet. The state reads `Connecting` until the
    /// link is up and drops back to `Disconnected` if it fails.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConsoleError::InvalidState(format!(
                "Cannot connect while {}",
                self.state
            )));
        }
        self.state = ConnectionState::Connecting;
        self.events.start();
        self.items = self.client.items().to_vec();

        if let Err(error) = self.open().await {
            tracing::warn!(%error, "connect failed");
            self.playback.teardown().await;
            self.state = ConnectionState::Disconnected;
            return Err(error);
        }
        self.state = ConnectionState::Connected;

        if !self.config.greeting.is_empty() {
            self.client
                .send_user_message_content(vec![ContentBlock::input_text(
                    self.config.greeting.clone(),
                )])?;
        }
        Ok(())
    }

    async fn open(&mut self) -> Result<()> {
        self.setup()?;
        self.playback.connect().await?;
        self.client.connect().await
    }

    /// Close the session and return to a clean default state. Safe to call
    /// when already disconnected.
    pub async fn disconnect(&mut self) {
        let was = self.state;
        self.state = ConnectionState::Disconnecting;
        self.events.clear();
        self.items.clear();
        self.marker.reset();
        self.talking = false;
        self.client.disconnect().await;
        self.playback.teardown().await;
        self.state = ConnectionState::Disconnected;
        if was != ConnectionState::Disconnected {
            tracing::info!(from = %was, "console disconnected");
        }
    }

    /// Full teardown followed by a fresh session setup.
    pub async fn reset(&mut self) -> Result<()> {
        self.disconnect().await;
        self.client.reset();
        self.setup()
    }

    /// Request removal of an item. `false` when the id is unknown.
    pub fn delete_item(&mut self, id: &str) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        self.client.delete_item(id)
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Send `text` as a user message and clear the input buffer. Does
    /// nothing (and returns `false`) for blank text or while disconnected.
    pub fn send_text(&mut self, text: &str) -> Result<bool> {
        if text.trim().is_empty() || !self.is_connected() {
            return Ok(false);
        }
        self.client
            .send_user_message_content(vec![ContentBlock::input_text(text)])?;
        self.input.clear();
        Ok(true)
    }

    /// Send whatever is in the input buffer.
    pub fn submit_input(&mut self) -> Result<bool> {
        let text = self.input.clone();
        self.send_text(&text)
    }

    pub fn set_turn_mode(&mut self, mode: TurnMode) -> Result<()> {
        self.config.turn_mode = mode;
        if !mode.push_to_talk() {
            self.talking = false;
        }
        self.client.update_session(SessionUpdate {
            turn_mode: Some(mode),
            ..SessionUpdate::default()
        })
    }

    /// Change the instructions. Sent right away when connected; otherwise
    /// picked up by the next connect. Returns whether it was sent.
    pub fn update_instructions(&mut self, instructions: impl Into<String>) -> Result<bool> {
        self.config.instructions = instructions.into();
        if !self.is_connected() {
            return Ok(false);
        }
        self.client.update_session(SessionUpdate {
            instructions: Some(self.config.instructions.clone()),
            ..SessionUpdate::default()
        })?;
        Ok(true)
    }

    /// Begin a push-to-talk turn, cutting off any assistant audio.
    pub async fn start_talking(&mut self) -> Result<()> {
        self.require_push_to_talk()?;
        if !self.is_connected() {
            return Err(ConsoleError::NotConnected);
        }
        if let Some(stopped) = self.playback.interrupt().await {
            self.client
                .cancel_response(Some(&stopped.track_id), stopped.offset)?;
        }
        self.talking = true;
        Ok(())
    }

    /// Feed microphone audio. In manual mode only during a push-to-talk turn.
    pub fn push_audio(&mut self, samples: &[i16]) -> Result<()> {
        if self.config.turn_mode.push_to_talk() && !self.talking {
            return Err(ConsoleError::InvalidState(
                "Push-to-talk is not active".into(),
            ));
        }
        self.client.append_input_audio(samples)
    }

    /// End the push-to-talk turn and ask for a response.
    pub fn stop_talking(&mut self) -> Result<()> {
        self.require_push_to_talk()?;
        if !self.talking {
            return Err(ConsoleError::InvalidState(
                "Push-to-talk is not active".into(),
            ));
        }
        self.talking = false;
        self.client.create_response()
    }

    fn require_push_to_talk(&self) -> Result<()> {
        if self.config.turn_mode.push_to_talk() {
            Ok(())
        } else {
            Err(ConsoleError::InvalidState(
                "Push-to-talk is disabled in voice activity mode".into(),
            ))
        }
    }

    /// Wait for and handle the next session event, returning it.
    pub async fn process_next(&mut self) -> Option<SessionEvent> {
        let event = self.client.next_event().await?;
        self.handle_event(&event).await;
        Some(event)
    }

    /// Handle everything already queued without waiting.
    pub async fn process_available(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.client.try_next_event() {
            self.handle_event(&event).await;
            handled += 1;
        }
        handled
    }

    pub async fn handle_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Realtime(record) => self.events.record(record.clone()),
            SessionEvent::Error(error) => {
                tracing::warn!(%error, "realtime session error");
            }
            SessionEvent::ConversationInterrupted => {
                if let Some(stopped) = self.playback.interrupt().await {
                    if let Err(error) = self
                        .client
                        .cancel_response(Some(&stopped.track_id), stopped.offset)
                    {
                        tracing::warn!(
                            track_id = %stopped.track_id,
                            %error,
                            "cancel after interrupt failed"
                        );
                    }
                }
            }
            SessionEvent::ConversationUpdated { item, delta } => {
                let mut item = item.clone();
                if let Err(error) = self.playback.on_updated(&mut item, delta.as_ref()) {
                    tracing::warn!(item_id = %item.id, %error, "playback update failed");
                }
                if self.client.get_item(&item.id).is_none() {
                    self.playback.release(&item.id);
                }
                self.refresh_items();
            }
            SessionEvent::Closed => {
                tracing::warn!("realtime session closed by transport");
                self.talking = false;
                self.playback.teardown().await;
                self.refresh_items();
                self.state = ConnectionState::Disconnected;
            }
        }
    }

    fn refresh_items(&mut self) {
        self.items = self.client.items().to_vec();
        self.playback.attach_artifacts(&mut self.items);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_talking(&self) -> bool {
        self.talking
    }

    pub fn push_to_talk_enabled(&self) -> bool {
        self.config.turn_mode.push_to_talk()
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Item snapshot as of the last update.
    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn marker(&self) -> MarkerState {
        self.marker.snapshot()
    }

    pub fn artifact_bytes(&self, handle: &ArtifactHandle) -> Option<Arc<[u8]>> {
        self.playback.resolve(handle)
    }
}

impl std::fmt::Debug for ConsoleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleController")
            .field("state", &self.state)
            .field("client", &self.client)
            .field("playback", &self.playback)
            .field("events", &self.events.len())
            .field("items", &self.items.len())
            .finish_non_exhaustive()
    }
}
