//! Realtime client: owns the link, folds server events into the
//! conversation, and runs tool calls.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::config::{SessionConfig, SessionUpdate};
use super::conversation::{Conversation, ConversationItem, Fold, ItemRole, ItemType, ToolCall};
use super::events::{client, ContentBlock, EventSource, RealtimeEventRecord, ServerEvent, SessionEvent};
use super::transport::{RealtimeTransport, TransportFrame, TransportLink};
use crate::config::TurnMode;
use crate::error::{ConsoleError, Result};
use crate::tools::{check_arguments, Tool, ToolArguments};

#[derive(Debug)]
struct ToolOutcome {
    call_id: String,
    output: String,
}

struct ActiveSession {
    link: TransportLink,
    tool_tx: mpsc::UnboundedSender<ToolOutcome>,
    tool_rx: mpsc::UnboundedReceiver<ToolOutcome>,
}

enum Next {
    Frame(Option<TransportFrame>),
    Tool(ToolOutcome),
}

/// Client side of one realtime conversation.
///
/// Events are delivered through [`RealtimeClient::next_event`] in the order
/// they happened: every client event sent, then for each server event its
/// raw record followed by the error, update, or interruption it caused.
pub struct RealtimeClient {
    transport: Arc<dyn RealtimeTransport>,
    session: SessionConfig,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    conversation: Conversation,
    active: Option<ActiveSession>,
    pending: VecDeque<SessionEvent>,
    /// Microphone audio not yet committed or sliced onto a user item.
    input_audio: Vec<i16>,
    sample_rate: u32,
}

impl RealtimeClient {
    pub fn new(transport: Arc<dyn RealtimeTransport>, sample_rate: u32) -> Self {
        Self {
            transport,
            session: SessionConfig::default(),
            tools: BTreeMap::new(),
            conversation: Conversation::new(sample_rate),
            active: None,
            pending: VecDeque::new(),
            input_audio: Vec::new(),
            sample_rate,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn items(&self) -> &[ConversationItem] {
        self.conversation.items()
    }

    pub fn get_item(&self, id: &str) -> Option<&ConversationItem> {
        self.conversation.get(id)
    }

    /// Open the link. The current session config goes out as the first event.
    pub async fn connect(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(ConsoleError::InvalidState(
                "Realtime session is already connected".into(),
            ));
        }
        self.reset();
        let bootstrap = client::session_update(self.session_payload()?);
        let link = self.transport.open(bootstrap.clone()).await?;
        let (tool_tx, tool_rx) = mpsc::unbounded_channel();
        self.active = Some(ActiveSession {
            link,
            tool_tx,
            tool_rx,
        });
        self.record(EventSource::Client, bootstrap);
        tracing::info!(
            tools = self.tools.len(),
            turn_mode = %self.session.turn_mode(),
            "realtime session connected"
        );
        Ok(())
    }

    /// Close the link and forget the conversation. Tool calls still running
    /// finish on their own and their results are dropped.
    pub async fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            let ActiveSession { link, .. } = active;
            if let Err(error) = link.close().await {
                tracing::warn!(%error, "realtime link did not close cleanly");
            }
            tracing::info!("realtime session disconnected");
        }
        self.reset();
    }

    /// Drop conversation state without touching the link.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.pending.clear();
        self.input_audio.clear();
    }

    /// Apply `update` and push the full session config when connected.
    pub fn update_session(&mut self, update: SessionUpdate) -> Result<()> {
        self.session.apply(update);
        if self.is_connected() {
            let event = client::session_update(self.session_payload()?);
            self.send(event)?;
        }
        Ok(())
    }

    /// Register a tool. Takes effect on the next `connect` or
    /// `update_session`.
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ConsoleError::InvalidArgument(format!(
                "Tool \"{name}\" already added"
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn remove_tool(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Create a user message and ask for a response.
    pub fn send_user_message_content(&mut self, content: Vec<ContentBlock>) -> Result<()> {
        if content.is_empty() {
            return Err(ConsoleError::InvalidArgument(
                "User message needs at least one content block".into(),
            ));
        }
        self.send(client::user_message(&content))?;
        self.create_response()
    }

    /// Ask for a response. In manual turn mode any buffered input audio is
    /// committed first and becomes part of the next user item.
    pub fn create_response(&mut self) -> Result<()> {
        if self.session.turn_mode() == TurnMode::Manual && !self.input_audio.is_empty() {
            self.send(client::input_audio_commit())?;
            self.conversation
                .queue_input_audio(std::mem::take(&mut self.input_audio));
        }
        self.send(client::response_create())
    }

    pub fn append_input_audio(&mut self, samples: &[i16]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        self.send(client::input_audio_append(samples))?;
        self.input_audio.extend_from_slice(samples);
        Ok(())
    }

    /// Microphone samples still held for slicing or the next commit.
    pub fn buffered_input_len(&self) -> usize {
        self.input_audio.len()
    }

    /// Request deletion of an item. Returns `false` for unknown ids.
    pub fn delete_item(&mut self, id: &str) -> Result<bool> {
        if self.conversation.get(id).is_none() {
            tracing::debug!(item_id = %id, "delete requested for unknown item");
            return Ok(false);
        }
        self.send(client::item_delete(id))?;
        Ok(true)
    }

    /// Cancel the in-flight response. With an item id, also truncate that
    /// assistant message's audio to what was actually played.
    pub fn cancel_response(
        &mut self,
        item_id: Option<&str>,
        sample_count: u64,
    ) -> Result<Option<ConversationItem>> {
        let Some(item_id) = item_id else {
            self.send(client::response_cancel())?;
            return Ok(None);
        };
        let Some(item) = self.conversation.get(item_id).cloned() else {
            tracing::debug!(%item_id, "cancel requested for unknown item");
            self.send(client::response_cancel())?;
            return Ok(None);
        };
        if item.item_type != ItemType::Message || item.role != ItemRole::Assistant {
            return Err(ConsoleError::InvalidArgument(format!(
                "Can only cancel assistant messages, got {} {}",
                item.role, item.item_type
            )));
        }
        self.send(client::response_cancel())?;
        let audio_end_ms = sample_count
            .saturating_mul(1000)
            .checked_div(u64::from(self.sample_rate))
            .unwrap_or(0);
        self.send(client::item_truncate(
            item_id,
            item.audio_content_index.unwrap_or(0),
            audio_end_ms,
        ))?;
        Ok(Some(item))
    }

    /// Wait for the next event. `None` once disconnected and drained.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let active = self.active.as_mut()?;
            let next = tokio::select! {
                frame = active.link.recv() => Next::Frame(frame),
                Some(outcome) = active.tool_rx.recv() => Next::Tool(outcome),
            };
            self.handle(next);
        }
    }

    /// Next event without waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let active = self.active.as_mut()?;
            let next = if let Ok(outcome) = active.tool_rx.try_recv() {
                Next::Tool(outcome)
            } else {
                Next::Frame(Some(active.link.try_recv()?))
            };
            self.handle(next);
        }
    }

    fn handle(&mut self, next: Next) {
        match next {
            Next::Frame(Some(TransportFrame::Event(payload))) => self.handle_server_event(payload),
            Next::Frame(Some(TransportFrame::Error(message))) => {
                tracing::warn!(%message, "realtime transport error");
                self.pending.push_back(SessionEvent::Error(json!({
                    "type": "error",
                    "error": { "type": "transport_error", "message": message },
                })));
            }
            Next::Frame(Some(TransportFrame::Closed)) | Next::Frame(None) => {
                tracing::warn!("realtime link closed");
                self.active = None;
                self.pending.push_back(SessionEvent::Closed);
            }
            Next::Tool(outcome) => {
                let result = self
                    .send(client::function_call_output(&outcome.call_id, &outcome.output))
                    .and_then(|()| self.send(client::response_create()));
                if let Err(error) = result {
                    tracing::debug!(call_id = %outcome.call_id, %error, "tool output dropped");
                }
            }
        }
    }

    fn handle_server_event(&mut self, payload: Value) {
        let parsed = ServerEvent::from_payload(&payload);
        self.record(EventSource::Server, payload.clone());
        let Some(event) = parsed else {
            tracing::debug!("server event without a type");
            return;
        };
        if let ServerEvent::Error { message } = &event {
            tracing::warn!(%message, "realtime server error");
            self.pending.push_back(SessionEvent::Error(payload));
            return;
        }
        let fold = self.conversation.process(&event, &self.input_audio);
        if let ServerEvent::SpeechStopped { audio_end_ms, .. } = &event {
            let released = self
                .conversation
                .release_input(*audio_end_ms, self.input_audio.len());
            self.input_audio.drain(..released);
        }
        match fold {
            Fold::Ignored => {}
            Fold::Interrupted => self.pending.push_back(SessionEvent::ConversationInterrupted),
            Fold::Updated {
                item,
                delta,
                completed,
            } => {
                if completed && item.item_type == ItemType::FunctionCall {
                    if let Some(call) = item.formatted.tool.clone() {
                        self.spawn_tool_call(call);
                    }
                }
                self.pending
                    .push_back(SessionEvent::ConversationUpdated { item, delta });
            }
        }
    }

    fn spawn_tool_call(&self, call: ToolCall) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let tool_tx = active.tool_tx.clone();
        let Some(tool) = self.tools.get(&call.name).cloned() else {
            tracing::warn!(tool = %call.name, "model called an unregistered tool");
            let output = error_output(&format!("Tool \"{}\" has not been added", call.name));
            let _ = tool_tx.send(ToolOutcome {
                call_id: call.call_id,
                output,
            });
            return;
        };
        tokio::spawn(async move {
            let output = match run_tool(tool.as_ref(), &call.arguments).await {
                Ok(value) => value.to_string(),
                Err(error) => {
                    tracing::warn!(tool = %call.name, %error, "tool call failed");
                    error_output(&error.to_string())
                }
            };
            // Receiver is gone if the session ended meanwhile.
            let _ = tool_tx.send(ToolOutcome {
                call_id: call.call_id,
                output,
            });
        });
    }

    fn send(&mut self, event: Value) -> Result<()> {
        let active = self.active.as_ref().ok_or(ConsoleError::NotConnected)?;
        active.link.send(event.clone())?;
        self.record(EventSource::Client, event);
        Ok(())
    }

    fn record(&mut self, source: EventSource, event: Value) {
        self.pending
            .push_back(SessionEvent::Realtime(RealtimeEventRecord::new(source, event)));
    }

    fn session_payload(&self) -> Result<Value> {
        let definitions = self.tools.values().map(|tool| tool.definition()).collect();
        self.session.to_payload(definitions)
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("connected", &self.is_connected())
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("items", &self.conversation.items().len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

async fn run_tool(tool: &dyn Tool, raw_arguments: &str) -> Result<Value> {
    let args = ToolArguments::parse(raw_arguments)?;
    check_arguments(tool.name(), args.raw(), &tool.parameters().schema)?;
    tool.execute(&args).await
}

fn error_output(message: &str) -> String {
    json!({ "error": message }).to_string()
}
