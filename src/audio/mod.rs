//! Audio plumbing: WAV artifacts and the streaming playback sink.

pub mod artifact;
pub mod sink;
pub mod wav;

pub use artifact::{ArtifactHandle, ArtifactStore};
pub use sink::{AudioSink, PlaybackCommand, PlaybackFeed, StreamPlayer, TrackOffset};
pub use wav::{encode_wav, wav_header, WAV_HEADER_LEN};
