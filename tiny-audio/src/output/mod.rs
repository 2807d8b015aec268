//! Output lines: blocking sinks for internal-format PCM
//!
//! The update thread owns exactly one line and is its only writer. Lines
//! are opened on that thread (some platform streams cannot move between
//! threads), so nothing here needs to be `Send`.

mod device;
mod null;

pub use device::{DeviceLine, acquire_output_line};
pub use null::NullLine;

use crate::config::{AudioConfig, OutputBackend};
use crate::error::AudioResult;

/// A blocking sink for interleaved internal-format frames
pub trait OutputLine {
    /// Write whole frames from `bytes`, blocking until the line has room.
    ///
    /// Returns the number of bytes accepted. Trailing bytes that do not form
    /// a whole frame are ignored.
    fn write(&mut self, bytes: &[u8]) -> AudioResult<usize>;

    /// Block until everything written so far has been played
    fn flush(&mut self) {}

    /// Stop playback; later writes may be discarded
    fn stop(&mut self) {}
}

/// Open the line selected by `config.backend`
pub fn open_line(config: &AudioConfig) -> AudioResult<Box<dyn OutputLine>> {
    match config.backend {
        OutputBackend::Device => Ok(Box::new(acquire_output_line(config)?)),
        OutputBackend::Null => Ok(Box::new(NullLine::new(config.ring_buffer_duration()))),
    }
}
