//! Normalization into per-channel internal-format buffers

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::format::{Encoding, PcmFormat};
use crate::stream::PcmStream;
use crate::upscale::upscale_8bit;
use crate::{BYTES_PER_SAMPLE, FRAME_SIZE, MAX_FRAMES, SAMPLE_RATE};

/// Decoded audio split into left and right 16-bit LE sample buffers.
///
/// Both buffers always have the same length. Mono sources share one
/// allocation between the two sides.
#[derive(Debug, Clone)]
pub struct ChannelData {
    left: Arc<[u8]>,
    right: Arc<[u8]>,
}

impl ChannelData {
    /// Use one 16-bit mono buffer for both channels (no copy)
    pub fn from_mono(samples: Vec<u8>) -> Self {
        let shared: Arc<[u8]> = samples.into();
        Self {
            left: shared.clone(),
            right: shared,
        }
    }

    /// De-interleave 16-bit stereo frames.
    ///
    /// The first two bytes of each frame go left, the next two right.
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(frames: &[u8]) -> Self {
        let count = frames.len() / FRAME_SIZE;
        let mut left = Vec::with_capacity(count * BYTES_PER_SAMPLE);
        let mut right = Vec::with_capacity(count * BYTES_PER_SAMPLE);
        for frame in frames.chunks_exact(FRAME_SIZE) {
            left.extend_from_slice(&frame[0..2]);
            right.extend_from_slice(&frame[2..4]);
        }
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Left channel samples
    pub fn left(&self) -> &Arc<[u8]> {
        &self.left
    }

    /// Right channel samples
    pub fn right(&self) -> &Arc<[u8]> {
        &self.right
    }

    /// Whether both channels share one mono buffer
    pub fn is_shared_mono(&self) -> bool {
        Arc::ptr_eq(&self.left, &self.right)
    }

    /// Bytes in each channel buffer
    pub fn bytes_per_channel(&self) -> usize {
        self.left.len()
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        self.left.len() / BYTES_PER_SAMPLE
    }

    /// Size of the data once re-interleaved
    pub fn interleaved_len(&self) -> u64 {
        (self.frames() * FRAME_SIZE) as u64
    }

    /// Write the data back out as interleaved internal-format frames
    pub fn write_interleaved<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (l, r) in self
            .left
            .chunks_exact(BYTES_PER_SAMPLE)
            .zip(self.right.chunks_exact(BYTES_PER_SAMPLE))
        {
            out.write_all(l)?;
            out.write_all(r)?;
        }
        Ok(())
    }
}

/// Convert a decodable stream into internal-format channel data.
///
/// Any failure aborts the whole conversion.
pub fn normalize(mut stream: PcmStream) -> Result<ChannelData, ConvertError> {
    let source = stream.format();

    if let Some(frames) = stream.frames() {
        check_length(frames)?;
    }

    let (format, bytes) = if source.matches(&PcmFormat::INTERNAL) || source.matches(&PcmFormat::MONO_16) {
        (source, stream.read_all()?)
    } else if let Some(target) = builtin_target(&source) {
        debug!("Re-encoding {} as {}", source, target);
        let raw = stream.read_all()?;
        (target, reencode_16(&source, &raw))
    } else if is_8bit_convertible(&source) {
        debug!("Upscaling 8-bit {}", source);
        let mut raw = stream.read_all()?;
        if source.encoding == Encoding::Unsigned {
            raw.iter_mut().for_each(|b| *b ^= 0x80);
        }
        (
            PcmFormat::signed(SAMPLE_RATE, 16, source.channels),
            upscale_8bit(&raw),
        )
    } else {
        warn!("Unable to convert audio resource: {}", source);
        return Err(ConvertError::CannotConvert(source));
    };

    check_length((bytes.len() / format.frame_size()) as u64)?;

    Ok(if format.channels == 1 {
        ChannelData::from_mono(trim_to_frames(bytes, BYTES_PER_SAMPLE))
    } else {
        ChannelData::from_interleaved(&bytes)
    })
}

fn check_length(frames: u64) -> Result<(), ConvertError> {
    if frames > MAX_FRAMES {
        warn!("Audio resource too long: {} frames", frames);
        return Err(ConvertError::TooLong { frames });
    }
    Ok(())
}

fn trim_to_frames(mut bytes: Vec<u8>, frame_size: usize) -> Vec<u8> {
    let whole = bytes.len() - bytes.len() % frame_size;
    bytes.truncate(whole);
    bytes
}

/// Target of the built-in 16-bit re-encoding, if `format` has one
fn builtin_target(format: &PcmFormat) -> Option<PcmFormat> {
    if format.sample_rate != SAMPLE_RATE || !(1..=2).contains(&format.channels) {
        return None;
    }
    let supported = match (format.encoding, format.bits_per_sample) {
        (Encoding::Signed, 16) => format.big_endian,
        (Encoding::Unsigned, 16) => true,
        (Encoding::Signed, 24 | 32) => true,
        (Encoding::Float, 32) => true,
        _ => false,
    };
    supported.then(|| PcmFormat::signed(SAMPLE_RATE, 16, format.channels))
}

fn is_8bit_convertible(format: &PcmFormat) -> bool {
    format.sample_rate == SAMPLE_RATE
        && (1..=2).contains(&format.channels)
        && format.bits_per_sample == 8
        && matches!(format.encoding, Encoding::Signed | Encoding::Unsigned)
}

/// Re-encode wider or differently ordered samples as 16-bit signed LE
fn reencode_16(format: &PcmFormat, raw: &[u8]) -> Vec<u8> {
    let width = format.bytes_per_sample();
    let mut out = Vec::with_capacity(raw.len() / width * BYTES_PER_SAMPLE);

    for sample in raw.chunks_exact(width) {
        let value: i16 = match (format.encoding, width) {
            (Encoding::Signed, 2) => read_int(sample, format.big_endian) as i16,
            (Encoding::Unsigned, 2) => (read_int(sample, format.big_endian) as u16 ^ 0x8000) as i16,
            (Encoding::Signed, 3) => (sign_extend_24(read_int(sample, format.big_endian)) >> 8) as i16,
            (Encoding::Signed, 4) => (read_int(sample, format.big_endian) as i32 >> 16) as i16,
            (Encoding::Float, 4) => {
                let f = f32::from_bits(read_int(sample, format.big_endian));
                (f64::from(f).clamp(-1.0, 1.0) * f64::from(i16::MAX)).round() as i16
            }
            _ => 0,
        };
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Assemble up to 4 bytes into an unsigned integer
fn read_int(bytes: &[u8], big_endian: bool) -> u32 {
    let fold = |acc: u32, b: &u8| (acc << 8) | u32::from(*b);
    if big_endian {
        bytes.iter().fold(0, fold)
    } else {
        bytes.iter().rev().fold(0, fold)
    }
}

fn sign_extend_24(value: u32) -> i32 {
    ((value << 8) as i32) >> 8
}
