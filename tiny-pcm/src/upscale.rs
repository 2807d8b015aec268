//! 8-bit to 16-bit linear upscaling
//!
//! Negative samples are normalized by 128 and positive ones by 127 so both
//! extremes land exactly on +/-1.0, then rescaled by `i16::MAX`. The result
//! is symmetric: -128 maps to -32767, 127 maps to 32767, 0 stays 0.

/// Upscale one signed 8-bit sample to 16 bits
#[inline]
pub fn upscale_sample(sample: i8) -> i16 {
    let value = f64::from(sample);
    let normalized = if value < 0.0 { value / 128.0 } else { value / 127.0 };
    (normalized.clamp(-1.0, 1.0) * f64::from(i16::MAX)).round() as i16
}

/// Upscale signed 8-bit PCM to 16-bit little-endian PCM.
///
/// Works for any channel count: every byte is one sample, handled on its own,
/// so interleaving is preserved and each channel is converted independently.
pub fn upscale_8bit(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        out.extend_from_slice(&upscale_sample(byte as i8).to_le_bytes());
    }
    out
}
