//! Playable WAV artifacts materialized from completed assistant audio.
//!
//! Every artifact is owned by an [`ArtifactStore`] and addressed through an
//! [`ArtifactHandle`]. Handles stay valid until the artifact is superseded
//! (a new artifact for the same item), released, or the store is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::wav::encode_wav;

/// Transient reference to a materialized artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub id: Uuid,
    /// Opaque resource address, `artifact:<uuid>`.
    pub uri: String,
    pub item_id: String,
    pub sample_count: usize,
    pub byte_len: usize,
}

struct StoredArtifact {
    handle: ArtifactHandle,
    bytes: Arc<[u8]>,
}

/// Owner of all live artifacts, keyed by conversation item.
pub struct ArtifactStore {
    sample_rate: u32,
    by_item: HashMap<String, StoredArtifact>,
}

impl ArtifactStore {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            by_item: HashMap::new(),
        }
    }

    /// Build the artifact for `item_id` from its accumulated samples.
    ///
    /// Returns the existing handle when the item already has an artifact for
    /// the same sample count; otherwise the previous artifact is released and
    /// replaced.
    pub fn materialize(&mut self, item_id: &str, samples: &[i16]) -> ArtifactHandle {
        if let Some(existing) = self.by_item.get(item_id) {
            if existing.handle.sample_count == samples.len() {
                return existing.handle.clone();
            }
        }

        let bytes: Arc<[u8]> = encode_wav(samples, self.sample_rate).into();
        let id = Uuid::new_v4();
        let handle = ArtifactHandle {
            id,
            uri: format!("artifact:{id}"),
            item_id: item_id.to_string(),
            sample_count: samples.len(),
            byte_len: bytes.len(),
        };
        let previous = self.by_item.insert(
            item_id.to_string(),
            StoredArtifact {
                handle: handle.clone(),
                bytes,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(
                item_id,
                released = %previous.handle.uri,
                "artifact superseded"
            );
        }
        tracing::debug!(item_id, uri = %handle.uri, bytes = handle.byte_len, "artifact materialized");
        handle
    }

    /// Current handle for an item, if any.
    pub fn get(&self, item_id: &str) -> Option<&ArtifactHandle> {
        self.by_item.get(item_id).map(|stored| &stored.handle)
    }

    /// Load the bytes behind a handle.
    ///
    /// A released or superseded handle fails to load; the failure is logged
    /// and reported as `None`.
    pub fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<[u8]>> {
        match self.by_item.get(&handle.item_id) {
            Some(stored) if stored.handle.id == handle.id => Some(Arc::clone(&stored.bytes)),
            _ => {
                tracing::warn!(
                    uri = %handle.uri,
                    item_id = %handle.item_id,
                    code = "released",
                    "artifact failed to load"
                );
                None
            }
        }
    }

    /// Release the artifact of one item. Returns whether one was held.
    pub fn release(&mut self, item_id: &str) -> bool {
        self.by_item.remove(item_id).is_some()
    }

    /// Release every outstanding artifact, returning how many were held.
    pub fn release_all(&mut self) -> usize {
        let count = self.by_item.len();
        self.by_item.clear();
        if count > 0 {
            tracing::debug!(count, "artifacts released");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.by_item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("sample_rate", &self.sample_rate)
            .field("artifacts", &self.by_item.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::WAV_HEADER_LEN;

    #[test]
    fn materialize_is_once_per_item_for_same_audio() {
        let mut store = ArtifactStore::new(24_000);
        let first = store.materialize("item_a", &[1, 2, 3]);
        let second = store.materialize("item_a", &[1, 2, 3]);

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(first.byte_len, WAV_HEADER_LEN + 6);
        assert!(first.uri.starts_with("artifact:"));
    }

    #[test]
    fn new_audio_supersedes_and_invalidates_old_handle() {
        let mut store = ArtifactStore::new(24_000);
        let old = store.materialize("item_a", &[1, 2, 3]);
        let new = store.materialize("item_a", &[1, 2]);

        assert_ne!(old.id, new.id);
        assert_eq!(store.len(), 1);
        assert!(store.resolve(&old).is_none());
        let bytes = store.resolve(&new).expect("current handle should load");
        assert_eq!(bytes.len(), WAV_HEADER_LEN + 4);
    }

    #[test]
    fn release_all_invalidates_every_handle() {
        let mut store = ArtifactStore::new(24_000);
        let a = store.materialize("item_a", &[1]);
        let b = store.materialize("item_b", &[2]);

        assert_eq!(store.release_all(), 2);
        assert!(store.is_empty());
        assert!(store.resolve(&a).is_none());
        assert!(store.resolve(&b).is_none());
        assert_eq!(store.release_all(), 0);
    }

    #[test]
    fn release_single_item() {
        let mut store = ArtifactStore::new(24_000);
        store.materialize("item_a", &[1]);

        assert!(store.release("item_a"));
        assert!(!store.release("item_a"));
        assert!(store.get("item_a").is_none());
    }
}
