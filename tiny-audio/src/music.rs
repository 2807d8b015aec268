//! Music handles

use std::sync::Arc;

use crate::mixer::{Mixer, MusicKey};
use crate::source::SourceReference;

/// A loaded music track.
///
/// The track stays registered with the mixer until [`Music::unload`] or
/// engine shutdown; dropping the handle does not stop it. Once unloaded,
/// every control is a no-op and getters report nothing.
pub struct Music {
    mixer: Arc<Mixer>,
    key: MusicKey,
}

impl Music {
    pub(crate) fn new(mixer: Arc<Mixer>, key: MusicKey) -> Self {
        Self { mixer, key }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SourceReference) -> R) -> Option<R> {
        self.mixer.with_music(self.key, f)
    }

    /// Start playing from the current position
    pub fn play(&self, looping: bool) {
        self.with(|m| {
            m.set_looping(looping);
            m.set_playing(true);
        });
    }

    /// Pause and rewind to the start
    pub fn stop(&self) {
        self.with(|m| {
            m.set_playing(false);
            m.rewind();
        });
    }

    pub fn pause(&self) {
        self.with(|m| m.set_playing(false));
    }

    pub fn resume(&self) {
        self.with(|m| m.set_playing(true));
    }

    /// Back to frame 0 without changing the playing state
    pub fn rewind(&self) {
        self.with(|m| m.rewind());
    }

    pub fn playing(&self) -> bool {
        self.with(|m| m.playing()).unwrap_or(false)
    }

    /// No data left to play (always true once unloaded)
    pub fn done(&self) -> bool {
        self.with(|m| m.bytes_available() == 0).unwrap_or(true)
    }

    pub fn looping(&self) -> bool {
        self.with(|m| m.looping()).unwrap_or(false)
    }

    pub fn set_loop(&self, looping: bool) {
        self.with(|m| m.set_looping(looping));
    }

    /// Frame to restart from when looping; ignored if past the end
    pub fn set_loop_position(&self, frame: u64) {
        self.with(|m| m.set_loop_frame(frame));
    }

    pub fn loop_position(&self) -> Option<u64> {
        self.with(|m| m.loop_frame())
    }

    /// Current playback position in frames
    pub fn position(&self) -> Option<u64> {
        self.with(|m| m.position())
    }

    pub fn volume(&self) -> Option<f64> {
        self.with(|m| m.volume())
    }

    /// Negative values are ignored
    pub fn set_volume(&self, volume: f64) {
        self.with(|m| m.set_volume(volume));
    }

    pub fn pan(&self) -> Option<f64> {
        self.with(|m| m.pan())
    }

    /// Clamped to [-1.0, 1.0]
    pub fn set_pan(&self, pan: f64) {
        self.with(|m| m.set_pan(pan));
    }

    /// Whether the track is still registered
    pub fn is_loaded(&self) -> bool {
        self.with(|_| ()).is_some()
    }

    /// Unregister the track and release its data
    pub fn unload(&self) {
        self.mixer.unregister_music(self.key);
    }
}

impl std::fmt::Debug for Music {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Music").field("key", &self.key).finish()
    }
}
