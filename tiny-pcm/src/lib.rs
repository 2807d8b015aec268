//! tiny-pcm: PCM ingestion for tiny-audio
//!
//! Turns an arbitrary decodable audio stream into the single format the
//! mixer understands. Nothing here touches threads or devices - it is pure
//! data transformation, driven by whoever owns the engine.
//!
//! # Internal Format
//!
//! | Property | Value |
//! |----------|-------|
//! | Sample rate | 44,100 Hz |
//! | Sample width | 16-bit signed |
//! | Byte order | little-endian |
//! | Channels | 2 (stored as separate left/right buffers after loading) |
//! | Frame size | 4 bytes |
//!
//! # Conversion Order
//!
//! ```text
//! already internal / 16-bit mono ──────────────► accept as-is
//! 16-bit BE, unsigned 16, 24/32-bit int, float ─► built-in re-encode to 16-bit
//! 8-bit signed or unsigned ─────────────────────► linear upscale to 16-bit
//! anything else ────────────────────────────────► ConvertError::CannotConvert
//! ```
//!
//! # Usage
//!
//! ```
//! use std::io::Cursor;
//! use tiny_pcm::{normalize, PcmFormat, PcmStream};
//!
//! // Two frames of 8-bit mono: silence, then full positive
//! let stream = PcmStream::raw(PcmFormat::MONO_8, Cursor::new(vec![0u8, 127]), Some(2));
//! let data = normalize(stream).unwrap();
//!
//! assert_eq!(data.frames(), 2);
//! assert_eq!(&data.left()[..], &[0x00, 0x00, 0xFF, 0x7F]);
//! assert!(data.is_shared_mono());
//! ```

mod convert;
mod error;
mod format;
mod stream;
mod upscale;

pub use convert::{ChannelData, normalize};
pub use error::ConvertError;
pub use format::{Encoding, PcmFormat};
pub use stream::PcmStream;
pub use upscale::{upscale_8bit, upscale_sample};

// =============================================================================
// Constants
// =============================================================================

/// Internal sample rate (frames per second)
pub const SAMPLE_RATE: u32 = 44_100;

/// Internal channel count
pub const CHANNELS: u16 = 2;

/// Internal sample width in bits
pub const BITS_PER_SAMPLE: u16 = 16;

/// Bytes per interleaved internal frame (2 channels x 2 bytes)
pub const FRAME_SIZE: usize = 4;

/// Bytes per sample in one channel buffer
pub const BYTES_PER_SAMPLE: usize = 2;

/// Longest accepted resource, in frames (signed 32-bit frame count)
pub const MAX_FRAMES: u64 = i32::MAX as u64;
