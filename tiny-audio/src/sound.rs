//! Sound effect handles

use std::sync::Arc;

use tracing::warn;

use crate::mixer::Mixer;
use crate::source::{SourceReference, Storage};

/// A loaded one-shot sound.
///
/// Every `play` starts a new, independent instance over the same data;
/// instances remove themselves when they finish. Clones share the id, so
/// `stop` on any clone cancels all of them.
#[derive(Clone)]
pub struct Sound {
    mixer: Arc<Mixer>,
    storage: Storage,
    id: u32,
}

impl Sound {
    pub(crate) fn new(mixer: Arc<Mixer>, storage: Storage, id: u32) -> Self {
        Self { mixer, storage, id }
    }

    /// Sequence number shared by all instances of this sound
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Play once at full volume, centered
    pub fn play(&self) {
        self.play_with(1.0, 0.0);
    }

    /// Play once with the given volume and pan.
    ///
    /// Negative volumes fall back to 1.0; pan is clamped to [-1.0, 1.0].
    pub fn play_with(&self, volume: f64, pan: f64) {
        if self.mixer.is_closed() {
            return;
        }
        let cursor = match self.storage.open_cursor() {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!("Failed to start sound {}: {}", self.id, e);
                return;
            }
        };
        self.mixer
            .register_sound(SourceReference::sound(cursor, self.id, volume, pan));
    }

    /// Cancel every playing instance
    pub fn stop(&self) {
        self.mixer.unregister_all_sounds(self.id);
    }

    /// Cancel every instance and release this handle's data
    pub fn unload(self) {
        self.stop();
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("id", &self.id)
            .field("storage", &self.storage)
            .finish()
    }
}
