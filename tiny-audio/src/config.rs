//! Configuration management (audio.toml)
//!
//! Handles loading, saving, and providing defaults for engine settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AudioError, AudioResult};

/// Audio engine configuration.
///
/// Every field has a default, so a partial (or missing) file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Initial global volume (default: 1.0, must be >= 0.0)
    #[serde(default = "default_volume")]
    pub global_volume: f64,
    /// Preferred output device name (default: none, first compatible device)
    #[serde(default)]
    pub device: Option<String>,
    /// Where mixed audio goes (default: Device)
    #[serde(default)]
    pub backend: OutputBackend,
    /// Upper bound on audio mixed per scheduler tick, in ms (default: 25)
    #[serde(default = "default_max_tick_ms")]
    pub max_tick_ms: u32,
    /// Voluntary sleep between scheduler ticks, in ms (default: 1)
    #[serde(default = "default_tick_sleep_ms")]
    pub tick_sleep_ms: u64,
    /// Device-side buffer length, in ms (default: 100)
    #[serde(default = "default_ring_buffer_ms")]
    pub ring_buffer_ms: u32,
    /// Stream loaded audio from a spool file instead of memory (default: false)
    #[serde(default)]
    pub stream_from_file: bool,
    /// Directory for spool files (default: system temp directory)
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
}

/// Output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// A real audio device
    #[default]
    Device,
    /// Discard audio, paced in real time (headless runs)
    Null,
}

fn default_volume() -> f64 {
    1.0
}
fn default_max_tick_ms() -> u32 {
    25
}
fn default_tick_sleep_ms() -> u64 {
    1
}
fn default_ring_buffer_ms() -> u32 {
    100
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            global_volume: default_volume(),
            device: None,
            backend: OutputBackend::default(),
            max_tick_ms: default_max_tick_ms(),
            tick_sleep_ms: default_tick_sleep_ms(),
            ring_buffer_ms: default_ring_buffer_ms(),
            stream_from_file: false,
            spool_dir: None,
        }
    }
}

impl AudioConfig {
    /// Maximum frames mixed in one scheduler tick (never less than one frame)
    pub fn max_frames_per_tick(&self) -> usize {
        let frames = f64::from(tiny_pcm::SAMPLE_RATE) / 1000.0 * f64::from(self.max_tick_ms);
        (frames as usize).max(1)
    }

    /// Sleep between scheduler ticks
    pub fn tick_sleep(&self) -> Duration {
        Duration::from_millis(self.tick_sleep_ms)
    }

    /// Device ring buffer length as a duration
    pub fn ring_buffer_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.ring_buffer_ms))
    }

    /// Device ring buffer capacity in interleaved samples
    pub fn ring_buffer_samples(&self) -> usize {
        let frames = (tiny_pcm::SAMPLE_RATE as usize * self.ring_buffer_ms as usize) / 1000;
        frames.max(1) * tiny_pcm::CHANNELS as usize
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\TinyEngine\config`
/// On macOS: `~/Library/Application Support/org.tiny-engine.TinyEngine`
/// On Linux: `~/.config/TinyEngine`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "tiny-engine", "TinyEngine")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `audio.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> AudioConfig {
    config_dir()
        .and_then(|dir| std::fs::read_to_string(dir.join("audio.toml")).ok())
        .and_then(|content| toml::from_str(&content).ok())
        .unwrap_or_default()
}

/// Loads the configuration from an explicit file.
///
/// Unlike [`load`], a file that exists but doesn't parse is an error.
pub fn load_from(path: &Path) -> AudioResult<AudioConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| AudioError::Config(e.to_string()))
}

/// Saves the configuration to disk.
///
/// Writes `audio.toml` to the platform's configuration directory.
/// Creates the directory if it doesn't exist.
pub fn save(config: &AudioConfig) -> AudioResult<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
        let content =
            toml::to_string_pretty(config).map_err(|e| AudioError::Config(e.to_string()))?;
        std::fs::write(dir.join("audio.toml"), content)?;
    }
    Ok(())
}
