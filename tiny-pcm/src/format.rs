//! Self-describing PCM format descriptors

use std::fmt;

use crate::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

/// Sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Two's complement integers
    Signed,
    /// Offset-binary integers (silence at the midpoint)
    Unsigned,
    /// IEEE 754 floats in [-1.0, 1.0]
    Float,
}

/// Format of a PCM byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Bits per single-channel sample
    pub bits_per_sample: u16,
    /// Interleaved channel count
    pub channels: u16,
    /// Sample encoding
    pub encoding: Encoding,
    /// Byte order of multi-byte samples
    pub big_endian: bool,
}

impl PcmFormat {
    /// The engine's internal format: 44.1 kHz, 16-bit signed LE, stereo
    pub const INTERNAL: Self = Self::signed(SAMPLE_RATE, BITS_PER_SAMPLE, CHANNELS);

    /// 16-bit mono - accepted as a degenerate stereo source
    pub const MONO_16: Self = Self::signed(SAMPLE_RATE, 16, 1);

    /// 8-bit signed mono at the internal rate
    pub const MONO_8: Self = Self::signed(SAMPLE_RATE, 8, 1);

    /// 8-bit signed stereo at the internal rate
    pub const STEREO_8: Self = Self::signed(SAMPLE_RATE, 8, 2);

    /// Signed little-endian PCM
    pub const fn signed(sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self {
            sample_rate,
            bits_per_sample,
            channels,
            encoding: Encoding::Signed,
            big_endian: false,
        }
    }

    /// Bytes per single-channel sample
    pub const fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    /// Bytes per interleaved frame
    pub const fn frame_size(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Whether two descriptors describe the same byte layout.
    ///
    /// Byte order is irrelevant for single-byte samples.
    pub fn matches(&self, other: &PcmFormat) -> bool {
        self.sample_rate == other.sample_rate
            && self.bits_per_sample == other.bits_per_sample
            && self.channels == other.channels
            && self.encoding == other.encoding
            && (self.bits_per_sample <= 8 || self.big_endian == other.big_endian)
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self.encoding {
            Encoding::Signed => "PCM_SIGNED",
            Encoding::Unsigned => "PCM_UNSIGNED",
            Encoding::Float => "PCM_FLOAT",
        };
        let channels = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n} channels"),
        };
        write!(
            f,
            "{} {} Hz, {} bit, {}",
            encoding, self.sample_rate, self.bits_per_sample, channels
        )?;
        if self.bits_per_sample > 8 {
            let order = if self.big_endian { "big-endian" } else { "little-endian" };
            write!(f, ", {order}")?;
        }
        Ok(())
    }
}
