//! Mixing engine
//!
//! Owns every active source and produces interleaved internal-format
//! frames on demand. One mutex guards all of it (source lists, global
//! volume, scratch pair), so caller threads and the update thread never
//! observe a half-applied change. Nothing inside the lock does I/O beyond
//! pulling bytes from already-open sources.

mod pan;
#[cfg(test)]
mod tests;

pub use pan::{apply_pan, clip};

use std::sync::{Mutex, MutexGuard, PoisonError};

use tiny_pcm::FRAME_SIZE;
use tracing::debug;

use crate::source::SourceReference;

/// Identity of a registered music reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicKey(u64);

struct MixerState {
    /// Insertion ordered
    music: Vec<(MusicKey, SourceReference)>,
    /// Insertion ordered
    sounds: Vec<SourceReference>,
    volume: f64,
    /// Reused for every pulled sample pair
    scratch: [i32; 2],
    /// Set on shutdown; registration is refused afterwards
    closed: bool,
    next_key: u64,
}

/// Left/right accumulators for one output frame
#[derive(Default)]
struct Accumulator {
    left: f64,
    right: f64,
    produced: bool,
}

impl Accumulator {
    /// Pull one sample pair from `source`, weight it and add it in
    #[inline]
    fn add(&mut self, source: &mut SourceReference, scratch: &mut [i32; 2], global_volume: f64) {
        source.next_two_bytes(scratch);
        let volume = source.volume() * global_volume;
        let (left, right) = apply_pan(
            f64::from(scratch[0]) * volume,
            f64::from(scratch[1]) * volume,
            source.pan(),
        );
        self.left += left;
        self.right += right;
        self.produced = true;
    }
}

/// Software mixer shared between caller threads and the update thread
pub struct Mixer {
    state: Mutex<MixerState>,
}

impl Mixer {
    /// Create an empty mixer. A negative or NaN `volume` falls back to 1.0.
    pub fn new(volume: f64) -> Self {
        Self {
            state: Mutex::new(MixerState {
                music: Vec::new(),
                sounds: Vec::new(),
                volume: if volume >= 0.0 { volume } else { 1.0 },
                scratch: [0; 2],
                closed: false,
                next_key: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        // Nothing in the state spans fields, so a panic mid-update leaves it usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Global volume
    // ========================================================================

    pub fn volume(&self) -> f64 {
        self.lock().volume
    }

    /// Negative and NaN volumes are ignored
    pub fn set_volume(&self, volume: f64) {
        if volume >= 0.0 {
            self.lock().volume = volume;
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a music reference. Returns `None` (and disposes the
    /// reference) once the mixer has been closed.
    pub fn register_music(&self, mut reference: SourceReference) -> Option<MusicKey> {
        let mut state = self.lock();
        if state.closed {
            reference.dispose();
            return None;
        }
        let key = MusicKey(state.next_key);
        state.next_key += 1;
        state.music.push((key, reference));
        Some(key)
    }

    /// Remove and dispose a music reference. Returns whether it was registered.
    pub fn unregister_music(&self, key: MusicKey) -> bool {
        let mut state = self.lock();
        let Some(index) = state.music.iter().position(|(k, _)| *k == key) else {
            return false;
        };
        let (_, mut reference) = state.music.remove(index);
        reference.dispose();
        true
    }

    /// Run `f` on a registered music reference inside the mixer lock
    pub fn with_music<R>(&self, key: MusicKey, f: impl FnOnce(&mut SourceReference) -> R) -> Option<R> {
        let mut state = self.lock();
        state
            .music
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, reference)| f(reference))
    }

    /// Register a sound reference. Returns `false` (and disposes the
    /// reference) once the mixer has been closed.
    pub fn register_sound(&self, mut reference: SourceReference) -> bool {
        let mut state = self.lock();
        if state.closed {
            reference.dispose();
            return false;
        }
        state.sounds.push(reference);
        true
    }

    /// Remove and dispose every sound instance tagged with `id`
    pub fn unregister_all_sounds(&self, id: u32) -> usize {
        let mut state = self.lock();
        let before = state.sounds.len();
        state.sounds.retain_mut(|sound| {
            if sound.sound_id() == Some(id) {
                sound.dispose();
                false
            } else {
                true
            }
        });
        before - state.sounds.len()
    }

    pub fn clear_music(&self) {
        let mut state = self.lock();
        for (_, reference) in state.music.iter_mut() {
            reference.dispose();
        }
        state.music.clear();
    }

    pub fn clear_sounds(&self) {
        let mut state = self.lock();
        for reference in state.sounds.iter_mut() {
            reference.dispose();
        }
        state.sounds.clear();
    }

    /// Drop every source and refuse further registration
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let MixerState { music, sounds, .. } = &mut *state;
        let count = music.len() + sounds.len();
        for (_, reference) in music.iter_mut() {
            reference.dispose();
        }
        for reference in sounds.iter_mut() {
            reference.dispose();
        }
        music.clear();
        sounds.clear();
        debug!("Mixer closed, {} sources released", count);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn music_count(&self) -> usize {
        self.lock().music.len()
    }

    pub fn sound_count(&self) -> usize {
        self.lock().sounds.len()
    }

    // ========================================================================
    // Frame production
    // ========================================================================

    /// Mix frames into `out`, returning the number of bytes written.
    ///
    /// Stops at the first frame no source contributes to, so a short count
    /// means everything went silent. Trailing bytes that do not make up a
    /// whole frame are left untouched.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.lock();
        let MixerState {
            music,
            sounds,
            volume,
            scratch,
            ..
        } = &mut *state;
        let global_volume = *volume;

        let mut written = 0;
        for frame in out.chunks_exact_mut(FRAME_SIZE) {
            let mut acc = Accumulator::default();

            for (_, reference) in music.iter_mut() {
                if reference.playing() && reference.bytes_available() > 0 {
                    acc.add(reference, scratch, global_volume);
                }
            }

            sounds.retain_mut(|sound| {
                if sound.bytes_available() == 0 {
                    sound.dispose();
                    return false;
                }
                acc.add(sound, scratch, global_volume);
                if sound.bytes_available() == 0 {
                    sound.dispose();
                    return false;
                }
                true
            });

            if !acc.produced {
                break;
            }

            frame[0..2].copy_from_slice(&clip(acc.left).to_le_bytes());
            frame[2..4].copy_from_slice(&clip(acc.right).to_le_bytes());
            written += FRAME_SIZE;
        }
        written
    }

    /// Advance every active source by `bytes` without producing output.
    ///
    /// Paused music keeps its position. Sounds that run out are removed.
    pub fn skip(&self, bytes: u64) {
        let mut state = self.lock();
        let MixerState { music, sounds, .. } = &mut *state;

        for (_, reference) in music.iter_mut() {
            if reference.playing() && reference.bytes_available() > 0 {
                reference.skip_bytes(bytes);
            }
        }

        sounds.retain_mut(|sound| {
            if sound.bytes_available() > 0 {
                sound.skip_bytes(bytes);
            }
            if sound.bytes_available() == 0 {
                sound.dispose();
                return false;
            }
            true
        });
    }
}
