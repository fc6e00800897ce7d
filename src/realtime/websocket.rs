//! WebSocket transport with heartbeat and bounded reconnect.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    time::{self, MissedTickBehavior},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

use super::transport::{RealtimeTransport, TransportFrame, TransportLink};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};

type RealtimeWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Realtime transport over `wss://…/v1/realtime?model=…`.
#[derive(Clone)]
pub struct WebSocketTransport {
    url: String,
    api_key: String,
    heartbeat_interval: Duration,
    reconnect_max_attempts: usize,
    reconnect_base_delay: Duration,
    reconnect_max_delay: Duration,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("reconnect_max_attempts", &self.reconnect_max_attempts)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    pub fn new(config: &ConsoleConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConsoleError::Authentication("Missing OPENAI_API_KEY".into()));
        }
        Ok(Self {
            url: build_realtime_url(&config.base_url, &config.model)?,
            api_key,
            heartbeat_interval: config.heartbeat_interval,
            reconnect_max_attempts: config.reconnect_max_attempts,
            reconnect_base_delay: config.reconnect_base_delay,
            reconnect_max_delay: config.reconnect_max_delay,
        })
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    async fn open(&self, bootstrap: Value) -> Result<TransportLink> {
        let bootstrap = serde_json::to_string(&bootstrap)?;
        let mut socket = connect_realtime_socket(&self.url, &self.api_key).await?;
        send_text(&mut socket, &bootstrap).await?;
        tracing::debug!(url = %self.url, "realtime websocket connected");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = Supervisor {
            transport: self.clone(),
            bootstrap,
            inbound_tx,
            outbound_rx,
            shutdown_rx,
        };
        let task = tokio::spawn(supervisor.run(socket));

        Ok(TransportLink::new(outbound_tx, inbound_rx).with_runtime(shutdown_tx, task))
    }
}

enum ConnectionOutcome {
    Shutdown,
    Disconnected,
}

struct Supervisor {
    transport: WebSocketTransport,
    /// Latest `session.update`, replayed after a reconnect.
    bootstrap: String,
    inbound_tx: mpsc::UnboundedSender<TransportFrame>,
    outbound_rx: mpsc::UnboundedReceiver<Value>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Supervisor {
    async fn run(mut self, mut socket: RealtimeWebSocket) {
        let mut reconnect_attempt = 0usize;
        loop {
            let outcome = self.run_active_connection(&mut socket).await;
            if matches!(outcome, ConnectionOutcome::Shutdown) || *self.shutdown_rx.borrow() {
                break;
            }

            if reconnect_attempt >= self.transport.reconnect_max_attempts {
                self.report("Realtime reconnect attempts exhausted".into());
                break;
            }
            reconnect_attempt += 1;

            let delay = compute_backoff_delay(
                reconnect_attempt,
                self.transport.reconnect_base_delay,
                self.transport.reconnect_max_delay,
            );
            tracing::warn!(attempt = reconnect_attempt, ?delay, "realtime websocket reconnecting");
            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                changed = self.shutdown_rx.changed() => {
                    if changed.is_ok() && *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
            if *self.shutdown_rx.borrow() {
                break;
            }

            match connect_realtime_socket(&self.transport.url, &self.transport.api_key).await {
                Ok(mut reconnected) => {
                    if let Err(error) = send_text(&mut reconnected, &self.bootstrap).await {
                        self.report(format!("Realtime bootstrap failed during reconnect: {error}"));
                        continue;
                    }
                    socket = reconnected;
                    reconnect_attempt = 0;
                }
                Err(error) => {
                    self.report(format!("Realtime reconnect failed: {error}"));
                    if matches!(error, ConsoleError::Authentication(_)) {
                        break;
                    }
                }
            }
        }

        let _ = self.inbound_tx.send(TransportFrame::Closed);
    }

    fn report(&self, message: String) {
        let _ = self.inbound_tx.send(TransportFrame::Error(message));
    }

    async fn run_active_connection(&mut self, socket: &mut RealtimeWebSocket) -> ConnectionOutcome {
        let mut heartbeat = time::interval(self.transport.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        let _ = socket.send(Message::Close(None)).await;
                        return ConnectionOutcome::Shutdown;
                    }
                }
                outgoing = self.outbound_rx.recv() => {
                    let Some(event) = outgoing else {
                        let _ = socket.send(Message::Close(None)).await;
                        return ConnectionOutcome::Shutdown;
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(error) => {
                            self.report(format!("Failed to encode client event: {error}"));
                            continue;
                        }
                    };
                    if event.get("type").and_then(Value::as_str) == Some("session.update") {
                        self.bootstrap = text.clone();
                    }
                    if let Err(error) = socket.send(Message::Text(text.into())).await {
                        self.report(format!("Realtime websocket send failed: {error}"));
                        return ConnectionOutcome::Disconnected;
                    }
                }
                _ = heartbeat.tick() => {
                    if let Err(error) = socket.send(Message::Ping(Default::default())).await {
                        self.report(format!("Realtime heartbeat failed: {error}"));
                        return ConnectionOutcome::Disconnected;
                    }
                }
                frame = socket.next() => {
                    match frame {
                        Some(Ok(message)) => {
                            if let Err(error) = self.handle_server_message(socket, message).await {
                                self.report(format!("Realtime websocket frame handling failed: {error}"));
                                return ConnectionOutcome::Disconnected;
                            }
                        }
                        Some(Err(error)) => {
                            self.report(format!("Realtime websocket receive failed: {error}"));
                            return ConnectionOutcome::Disconnected;
                        }
                        None => return ConnectionOutcome::Disconnected,
                    }
                }
            }
        }
    }

    async fn handle_server_message(
        &self,
        socket: &mut RealtimeWebSocket,
        message: Message,
    ) -> std::result::Result<(), WsError> {
        match message {
            Message::Text(text) => self.forward(text.as_ref()),
            Message::Binary(bytes) => {
                if let Ok(text) = std::str::from_utf8(bytes.as_ref()) {
                    self.forward(text);
                }
            }
            Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
            Message::Pong(_) | Message::Frame(_) => {}
            Message::Close(_) => return Err(WsError::ConnectionClosed),
        }
        Ok(())
    }

    fn forward(&self, payload: &str) {
        let frame = match serde_json::from_str::<Value>(payload) {
            Ok(value) => TransportFrame::Event(value),
            Err(error) => {
                TransportFrame::Error(format!("Failed to parse realtime event payload: {error}"))
            }
        };
        let _ = self.inbound_tx.send(frame);
    }
}

fn build_realtime_url(base_url: &str, model: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::Configuration(
            "Realtime base URL cannot be empty".into(),
        ));
    }
    let separator = if trimmed.contains('?') { "&" } else { "?" };
    Ok(format!("{trimmed}{separator}model={model}"))
}

async fn connect_realtime_socket(url: &str, api_key: &str) -> Result<RealtimeWebSocket> {
    let mut request = url.into_client_request().map_err(|error| {
        ConsoleError::Configuration(format!("Invalid realtime websocket URL: {error}"))
    })?;
    let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
        ConsoleError::Configuration(format!("Invalid realtime auth header: {error}"))
    })?;
    request.headers_mut().insert("Authorization", auth_value);
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    connect_async(request)
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

async fn send_text(socket: &mut RealtimeWebSocket, payload: &str) -> Result<()> {
    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|error| ConsoleError::Stream(format!("Realtime bootstrap send failed: {error}")))
}

fn map_connect_error(error: WsError) -> ConsoleError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                ConsoleError::Authentication(format!(
                    "Realtime websocket authentication failed with status {status}"
                ))
            } else {
                ConsoleError::api(
                    status,
                    format!("Realtime websocket handshake failed with status {status}"),
                )
            }
        }
        WsError::Io(error) => ConsoleError::Io(error),
        WsError::Url(error) => {
            ConsoleError::Configuration(format!("Invalid realtime websocket URL: {error}"))
        }
        other => ConsoleError::Stream(format!("Realtime websocket connect failed: {other}")),
    }
}

fn compute_backoff_delay(attempt: usize, base: Duration, max_delay: Duration) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1) as u32) as f64;
    let scaled = base.as_secs_f64() * multiplier;
    Duration::from_secs_f64(scaled.min(max_delay.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_gets_model_query_parameter() {
        assert_eq!(
            build_realtime_url("wss://host/v1/realtime", "m1").unwrap(),
            "wss://host/v1/realtime?model=m1"
        );
        assert_eq!(
            build_realtime_url("wss://host/v1/realtime?x=1", "m1").unwrap(),
            "wss://host/v1/realtime?x=1&model=m1"
        );
        assert!(build_realtime_url("  ", "m1").is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(350);
        assert_eq!(compute_backoff_delay(1, base, max), Duration::from_millis(100));
        assert_eq!(compute_backoff_delay(2, base, max), Duration::from_millis(200));
        assert_eq!(compute_backoff_delay(3, base, max), Duration::from_millis(350));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let err = WebSocketTransport::new(&ConsoleConfig::default(), " ").unwrap_err();
        assert!(matches!(err, ConsoleError::Authentication(_)));
    }
}
