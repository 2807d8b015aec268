//! Public engine surface: init, load, global volume, shutdown
//!
//! An [`Audio`] starts uninitialized. `init` creates the mixer and starts the
//! update thread; `shutdown` stops the thread, releases every source and lets
//! go of the spool directory, which is removed once no `Sound` still holds a
//! file in it. Before init and after shutdown, loads fail with
//! [`AudioError::NotInitialized`] and everything else is a no-op.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tiny_pcm::{ChannelData, PcmStream};
use tracing::{debug, info, warn};

use crate::config::{self, AudioConfig};
use crate::error::{AudioError, AudioResult};
use crate::mixer::Mixer;
use crate::music::Music;
use crate::output::{self, OutputLine};
use crate::scheduler::{self, SchedulerHandle};
use crate::sound::Sound;
use crate::source::{SourceReference, Storage};
use crate::spool::{self, Spool, SpoolFile};

/// Where loaded samples are kept during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Decoded into memory
    Memory,
    /// Written to a spool file and streamed from disk
    Stream,
}

/// Everything that exists only while the engine is running
struct Live {
    mixer: Arc<Mixer>,
    scheduler: SchedulerHandle,
    /// Created on the first streamed load
    spool: Option<Spool>,
    config: AudioConfig,
}

/// The audio engine
pub struct Audio {
    live: Mutex<Option<Live>>,
    /// Next sound id; never reused within one engine
    sound_counter: AtomicU32,
}

impl Default for Audio {
    fn default() -> Self {
        Self::new()
    }
}

impl Audio {
    /// An uninitialized engine
    pub fn new() -> Self {
        Self {
            live: Mutex::new(None),
            sound_counter: AtomicU32::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Live>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mixer(&self) -> Option<Arc<Mixer>> {
        self.lock().as_ref().map(|live| live.mixer.clone())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize with the user's `audio.toml` (or defaults)
    pub fn init(&self) -> AudioResult<()> {
        self.init_with(config::load())
    }

    /// Initialize with an explicit configuration
    pub fn init_with(&self, config: AudioConfig) -> AudioResult<()> {
        let line_config = config.clone();
        self.init_with_line(config, move || output::open_line(&line_config))
    }

    /// Initialize with a caller-supplied output line.
    ///
    /// `open_line` runs on the update thread. If it fails the engine stays
    /// uninitialized. Calling this on a running engine does nothing.
    pub fn init_with_line<F>(&self, config: AudioConfig, open_line: F) -> AudioResult<()>
    where
        F: FnOnce() -> AudioResult<Box<dyn OutputLine>> + Send + 'static,
    {
        let mut live = self.lock();
        if live.is_some() {
            debug!("Audio already initialized");
            return Ok(());
        }

        let removed = spool::sweep_stale(config.spool_dir.as_deref());
        if removed > 0 {
            debug!("Swept {} stale spool directories", removed);
        }

        let mixer = Arc::new(Mixer::new(config.global_volume));
        let scheduler = match scheduler::spawn(mixer.clone(), &config, Box::new(open_line)) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Audio initialization failed: {}", e);
                return Err(e);
            }
        };

        info!("Audio initialized");
        *live = Some(Live {
            mixer,
            scheduler,
            spool: None,
            config,
        });
        Ok(())
    }

    /// Stop the update thread and release every source.
    ///
    /// Does not wait for the thread; an in-flight device write completes on
    /// its own. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let Some(live) = self.lock().take() else {
            return;
        };

        live.scheduler.stop();
        live.mixer.close();
        if let Some(spool) = live.spool {
            if let Err(e) = spool.close() {
                warn!("Failed to remove spool directory: {}", e);
            }
        }
        info!("Audio shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    // ========================================================================
    // Global volume
    // ========================================================================

    /// Global volume, or `None` when not initialized
    pub fn global_volume(&self) -> Option<f64> {
        self.mixer().map(|mixer| mixer.volume())
    }

    /// Negative values are ignored, as are calls on an uninitialized engine
    pub fn set_global_volume(&self, volume: f64) {
        if let Some(mixer) = self.mixer() {
            mixer.set_volume(volume);
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a music track with the configured default residency
    pub fn load_music(&self, stream: PcmStream) -> AudioResult<Music> {
        let residency = self.default_residency()?;
        self.load_music_with(stream, residency)
    }

    /// Load a music track. It starts paused.
    pub fn load_music_with(&self, stream: PcmStream, residency: Residency) -> AudioResult<Music> {
        let (mixer, storage) = self.prepare(stream, residency)?;
        let cursor = storage.open_cursor()?;
        let key = mixer
            .register_music(SourceReference::music(cursor))
            .ok_or(AudioError::NotInitialized)?;
        Ok(Music::new(mixer, key))
    }

    /// Load a sound effect with the configured default residency
    pub fn load_sound(&self, stream: PcmStream) -> AudioResult<Sound> {
        let residency = self.default_residency()?;
        self.load_sound_with(stream, residency)
    }

    /// Load a sound effect
    pub fn load_sound_with(&self, stream: PcmStream, residency: Residency) -> AudioResult<Sound> {
        let (mixer, storage) = self.prepare(stream, residency)?;
        let id = self.sound_counter.fetch_add(1, Ordering::Relaxed);
        Ok(Sound::new(mixer, storage, id))
    }

    fn default_residency(&self) -> AudioResult<Residency> {
        let live = self.lock();
        let live = live.as_ref().ok_or(AudioError::NotInitialized)?;
        Ok(if live.config.stream_from_file {
            Residency::Stream
        } else {
            Residency::Memory
        })
    }

    /// Convert `stream` and put it where `residency` says
    fn prepare(&self, stream: PcmStream, residency: Residency) -> AudioResult<(Arc<Mixer>, Storage)> {
        let mixer = self.mixer().ok_or(AudioError::NotInitialized)?;

        let format = stream.format();
        let data = tiny_pcm::normalize(stream).map_err(|e| {
            warn!("Failed to load {} audio: {}", format, e);
            e
        })?;

        let storage = match residency {
            Residency::Memory => Storage::Memory(data),
            Residency::Stream => Storage::Stream(self.spool_write(&data)?),
        };
        Ok((mixer, storage))
    }

    /// Spool `data` to disk. The engine lock is only held to find the spool,
    /// never for the write itself.
    fn spool_write(&self, data: &ChannelData) -> AudioResult<SpoolFile> {
        let spool = {
            let mut guard = self.lock();
            let live = guard.as_mut().ok_or(AudioError::NotInitialized)?;
            match &live.spool {
                Some(spool) => spool.clone(),
                None => {
                    let spool = Spool::create(live.config.spool_dir.as_deref())?;
                    live.spool = Some(spool.clone());
                    spool
                }
            }
        };

        spool.write(data).map_err(|e| {
            warn!("Failed to spool audio: {}", e);
            AudioError::Io(e)
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Registered music tracks (0 when not initialized)
    pub fn active_music(&self) -> usize {
        self.mixer().map_or(0, |mixer| mixer.music_count())
    }

    /// Playing sound instances (0 when not initialized)
    pub fn active_sounds(&self) -> usize {
        self.mixer().map_or(0, |mixer| mixer.sound_count())
    }

    /// Whether the update thread is still executing
    pub fn is_updating(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|live| live.scheduler.is_alive())
    }
}

impl Drop for Audio {
    fn drop(&mut self) {
        self.shutdown();
    }
}
