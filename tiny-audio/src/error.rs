//! Audio engine errors

use tiny_pcm::ConvertError;

/// Errors surfaced by the audio engine
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Loading failed: unsupported format, unreadable stream or a too-long resource
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Spool file could not be written or opened
    #[error("spool I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No output line accepts the internal format
    #[error("no compatible audio output line: {0}")]
    DeviceUnavailable(String),

    /// The output line failed after startup
    #[error("audio output failed: {0}")]
    Output(String),

    /// The engine is not running (never started, or already shut down)
    #[error("audio engine is not initialized")]
    NotInitialized,

    /// Configuration file could not be parsed
    #[error("invalid audio configuration: {0}")]
    Config(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
