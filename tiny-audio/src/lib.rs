//! tiny-audio: real-time software mixer
//!
//! Mixes any number of music tracks and one-shot sounds into a single
//! 44.1 kHz 16-bit stereo stream and feeds it to an output line from a
//! dedicated update thread.
//!
//! # Architecture
//!
//! ```text
//! caller threads                         tiny-audio-update thread
//! ──────────────                         ────────────────────────
//! Audio::load_music / load_sound         loop {
//!   └─ tiny_pcm::normalize                 FrameClock::advance
//!   └─ Storage (memory or spool file)      Mixer::skip  (backlog over 25 ms)
//!   └─ Mixer::register_*  ──┐              Mixer::read  (zero-fill shortfall)
//! Music / Sound controls ───┤              OutputLine::write (blocks)
//!                           ▼              sleep 1 ms
//!                    Mutex<MixerState> ◄─ }
//! ```
//!
//! Every piece of shared state sits behind the mixer's single lock. The
//! output line belongs to the update thread alone.
//!
//! # Usage
//!
//! ```no_run
//! use std::fs::File;
//! use tiny_audio::{Audio, AudioConfig};
//! use tiny_pcm::PcmStream;
//!
//! let audio = Audio::new();
//! audio.init_with(AudioConfig::default())?;
//!
//! let music = audio.load_music(PcmStream::open(File::open("theme.wav")?)?)?;
//! music.play(true);
//!
//! let jump = audio.load_sound(PcmStream::open(File::open("jump.wav")?)?)?;
//! jump.play_with(0.8, -0.5);
//!
//! audio.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
mod engine;
mod error;
pub mod mixer;
mod music;
pub mod output;
pub mod scheduler;
mod sound;
pub mod source;
pub mod spool;

pub use config::{AudioConfig, OutputBackend};
pub use engine::{Audio, Residency};
pub use error::{AudioError, AudioResult};
pub use music::Music;
pub use output::OutputLine;
pub use sound::Sound;
