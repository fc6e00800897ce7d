//! Streaming audio sink: ordered PCM16 playback keyed by track.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ConsoleError, Result};

/// Track and sample position reported when playback is interrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOffset {
    pub track_id: String,
    /// Samples of the track that were played before the interruption.
    pub offset: u64,
}

/// Destination for streaming assistant audio.
#[async_trait]
pub trait AudioSink: Send {
    /// Prepare the output. Writes before `connect` are rejected.
    async fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Queue samples for `track_id`, preserving call order.
    fn add_pcm16(&mut self, samples: &[i16], track_id: &str) -> Result<()>;

    /// Stop playback and report the playing track, if any.
    async fn interrupt(&mut self) -> Option<TrackOffset>;
}

/// Commands delivered to the output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    Frame { track_id: String, samples: Vec<i16> },
    /// Drop everything queued and go silent.
    Stop,
}

#[derive(Debug, Default, Clone, Copy)]
struct TrackProgress {
    written: u64,
    played: u64,
}

impl TrackProgress {
    fn pending(&self) -> bool {
        self.played < self.written
    }
}

/// Per-track progress plus the track the device is on. Deltas for several
/// tracks may interleave, so counts are never reset by a write.
#[derive(Debug, Default)]
struct PlayheadState {
    tracks: HashMap<String, TrackProgress>,
    /// First-write order, used when the device has not reported yet.
    order: Vec<String>,
    current: Option<String>,
}

impl PlayheadState {
    fn wrote(&mut self, track_id: &str, samples: u64) {
        if !self.tracks.contains_key(track_id) {
            self.order.push(track_id.to_string());
        }
        self.tracks.entry(track_id.to_string()).or_default().written += samples;
    }

    fn played(&mut self, track_id: &str, samples: u64) {
        let Some(progress) = self.tracks.get_mut(track_id) else {
            return;
        };
        progress.played = (progress.played + samples).min(progress.written);
        self.current = Some(track_id.to_string());
    }

    /// The track being heard: the one last reported by the device while it
    /// still has samples queued, otherwise the oldest track with audio left.
    fn playing(&self) -> Option<TrackOffset> {
        let reported = self
            .current
            .as_ref()
            .filter(|id| self.tracks.get(*id).is_some_and(TrackProgress::pending));
        let track_id = reported.or_else(|| {
            self.order
                .iter()
                .find(|id| self.tracks.get(*id).is_some_and(TrackProgress::pending))
        })?;
        Some(TrackOffset {
            track_id: track_id.clone(),
            offset: self.tracks.get(track_id)?.played,
        })
    }
}

fn lock(state: &Mutex<PlayheadState>) -> MutexGuard<'_, PlayheadState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Default [`AudioSink`]: forwards frames, in order, to a [`PlaybackFeed`].
///
/// The feed side belongs to whatever drives the speaker. It reports consumed
/// samples back through [`PlaybackFeed::consumed`], which is the offset
/// returned from [`AudioSink::interrupt`].
pub struct StreamPlayer {
    sample_rate: u32,
    frames_tx: mpsc::UnboundedSender<PlaybackCommand>,
    playhead: Arc<Mutex<PlayheadState>>,
    connected: bool,
}

/// Device side of a [`StreamPlayer`].
pub struct PlaybackFeed {
    frames_rx: mpsc::UnboundedReceiver<PlaybackCommand>,
    playhead: Arc<Mutex<PlayheadState>>,
}

impl StreamPlayer {
    pub fn new(sample_rate: u32) -> (Self, PlaybackFeed) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let playhead = Arc::new(Mutex::new(PlayheadState::default()));
        let player = Self {
            sample_rate,
            frames_tx,
            playhead: Arc::clone(&playhead),
            connected: false,
        };
        (
            player,
            PlaybackFeed {
                frames_rx,
                playhead,
            },
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[async_trait]
impl AudioSink for StreamPlayer {
    async fn connect(&mut self) -> Result<()> {
        if self.frames_tx.is_closed() {
            return Err(ConsoleError::Audio("Playback feed has been dropped".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn add_pcm16(&mut self, samples: &[i16], track_id: &str) -> Result<()> {
        if !self.connected {
            return Err(ConsoleError::InvalidState(
                "Audio sink must be connected before writing".into(),
            ));
        }
        if samples.is_empty() {
            return Ok(());
        }
        lock(&self.playhead).wrote(track_id, samples.len() as u64);
        self.frames_tx
            .send(PlaybackCommand::Frame {
                track_id: track_id.to_string(),
                samples: samples.to_vec(),
            })
            .map_err(|_| ConsoleError::Audio("Playback feed has been dropped".into()))
    }

    async fn interrupt(&mut self) -> Option<TrackOffset> {
        let taken = std::mem::take(&mut *lock(&self.playhead));
        let _ = self.frames_tx.send(PlaybackCommand::Stop);
        taken.playing()
    }
}

impl PlaybackFeed {
    /// Wait for the next command. `None` once the player is dropped.
    pub async fn next(&mut self) -> Option<PlaybackCommand> {
        self.frames_rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<PlaybackCommand> {
        self.frames_rx.try_recv().ok()
    }

    /// Report that `samples` of `track_id` reached the speaker.
    pub fn consumed(&self, track_id: &str, samples: u64) {
        lock(&self.playhead).played(track_id, samples);
    }
}
