//! Playback reconciler: routes assistant audio to the sink, builds
//! artifacts for completed items, and handles barge-in.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::{ArtifactHandle, ArtifactStore, AudioSink, TrackOffset};
use crate::error::Result;
use crate::realtime::{ConversationItem, ItemDelta, ItemStatus};

/// Sole owner of the audio sink and the artifact store.
pub struct PlaybackReconciler {
    sink: Box<dyn AudioSink>,
    artifacts: ArtifactStore,
    /// Interrupted tracks and the offset they were cut at.
    cancelled: HashMap<String, u64>,
}

impl PlaybackReconciler {
    pub fn new(sink: Box<dyn AudioSink>, sample_rate: u32) -> Self {
        Self {
            sink,
            artifacts: ArtifactStore::new(sample_rate),
            cancelled: HashMap::new(),
        }
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.sink.connect().await
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_connected()
    }

    /// React to one item update. Audio deltas go to the sink unless the
    /// track was cancelled; a completed item with audio gets its artifact.
    pub fn on_updated(
        &mut self,
        item: &mut ConversationItem,
        delta: Option<&ItemDelta>,
    ) -> Result<()> {
        if let Some(ItemDelta::Audio(samples)) = delta {
            if let Some(offset) = self.cancelled.get(&item.id) {
                tracing::debug!(
                    item_id = %item.id,
                    offset,
                    samples = samples.len(),
                    "dropping audio for cancelled track"
                );
            } else {
                self.sink.add_pcm16(samples, &item.id)?;
            }
        }

        if item.status == ItemStatus::Completed && !item.formatted.audio.is_empty() {
            let handle = self.artifacts.materialize(&item.id, &item.formatted.audio);
            item.formatted.file = Some(handle);
        }
        Ok(())
    }

    /// Stop playback. The reported track is marked cancelled before this
    /// returns, so later deltas for it are dropped.
    pub async fn interrupt(&mut self) -> Option<TrackOffset> {
        let stopped = self.sink.interrupt().await?;
        tracing::info!(track_id = %stopped.track_id, offset = stopped.offset, "playback interrupted");
        self.cancelled
            .insert(stopped.track_id.clone(), stopped.offset);
        Some(stopped)
    }

    pub fn is_cancelled(&self, track_id: &str) -> bool {
        self.cancelled.contains_key(track_id)
    }

    /// Point each item's `file` at its live artifact, if any.
    pub fn attach_artifacts(&self, items: &mut [ConversationItem]) {
        for item in items {
            if let Some(handle) = self.artifacts.get(&item.id) {
                item.formatted.file = Some(handle.clone());
            }
        }
    }

    pub fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<[u8]>> {
        self.artifacts.resolve(handle)
    }

    /// Forget an item that left the conversation.
    pub fn release(&mut self, item_id: &str) {
        self.cancelled.remove(item_id);
        if self.artifacts.release(item_id) {
            tracing::debug!(item_id, "artifact released with its item");
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Stop playback, then release every artifact and cancel marker.
    pub async fn teardown(&mut self) {
        if self.sink.is_connected() {
            let _ = self.sink.interrupt().await;
        }
        self.artifacts.release_all();
        self.cancelled.clear();
    }
}

impl std::fmt::Debug for PlaybackReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackReconciler")
            .field("sink_connected", &self.sink.is_connected())
            .field("artifacts", &self.artifacts)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
