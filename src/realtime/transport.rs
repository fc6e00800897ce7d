//! Transport seam between the realtime client and the wire.

use async_trait::async_trait;
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::error::{ConsoleError, Result};

/// Inbound frame from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFrame {
    /// A decoded server event.
    Event(Value),
    /// A recoverable transport failure; the link stays open.
    Error(String),
    /// The link is gone for good.
    Closed,
}

/// Opens realtime links.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a link and send `bootstrap` (a `session.update` event) first.
    async fn open(&self, bootstrap: Value) -> Result<TransportLink>;
}

struct LinkRuntime {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// An open link: outbound events in, inbound frames out.
pub struct TransportLink {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: mpsc::UnboundedReceiver<TransportFrame>,
    runtime: Option<LinkRuntime>,
}

impl TransportLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<Value>,
        inbound: mpsc::UnboundedReceiver<TransportFrame>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            runtime: None,
        }
    }

    /// Attach the background task driving this link.
    pub fn with_runtime(mut self, shutdown_tx: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        self.runtime = Some(LinkRuntime { shutdown_tx, task });
        self
    }

    pub fn send(&self, event: Value) -> Result<()> {
        self.outbound
            .send(event)
            .map_err(|_| ConsoleError::Stream("Realtime link is closed".into()))
    }

    pub async fn recv(&mut self) -> Option<TransportFrame> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TransportFrame> {
        self.inbound.try_recv().ok()
    }

    /// Shut the link down and wait for its task.
    pub async fn close(mut self) -> Result<()> {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            runtime.task.await.map_err(|error| {
                ConsoleError::Stream(format!("Realtime runtime task failed: {error}"))
            })?;
        }
        Ok(())
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            runtime.task.abort();
        }
    }
}
