//! Conversion errors

use crate::format::PcmFormat;

/// Why a resource could not be turned into internal-format channel data.
///
/// Every variant aborts the whole load - there is no partial result.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The container or encoding is not something we can decode at all
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decodable, but no path leads to the internal format (wrong rate, too many channels, ...)
    #[error("cannot convert {0} to the internal format")]
    CannotConvert(PcmFormat),

    /// Frame count does not fit a signed 32-bit integer
    #[error("audio resource too long ({frames} frames)")]
    TooLong { frames: u64 },

    /// Reading the source failed
    #[error("I/O error while reading audio: {0}")]
    Io(#[from] std::io::Error),
}
