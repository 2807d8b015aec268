//! Decodable PCM streams
//!
//! A `PcmStream` is what the external resource loader hands us: a byte
//! source plus the format describing it. WAV containers are decoded with
//! `hound`; anything already raw just needs its descriptor.

use std::io::{self, Cursor, Read};
use std::mem;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::ConvertError;
use crate::format::{Encoding, PcmFormat};
use crate::{FRAME_SIZE, MAX_FRAMES, SAMPLE_RATE};

/// Read chunk size: one second of internal-format audio
const READ_CHUNK: usize = SAMPLE_RATE as usize * FRAME_SIZE;

/// Largest up-front allocation a declared length may trigger. Declared
/// lengths are untrusted; past this the buffer grows with the data.
const MAX_PREALLOC: usize = READ_CHUNK * 8;

/// Where a stream's bytes come from
enum Source {
    /// Decoded up front; handed over without copying
    Decoded(Vec<u8>),
    /// Read on demand
    Reader(Box<dyn Read + Send>),
}

/// An open, decodable PCM stream
pub struct PcmStream {
    format: PcmFormat,
    frames: Option<u64>,
    source: Source,
}

impl std::fmt::Debug for PcmStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmStream")
            .field("format", &self.format)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl PcmStream {
    /// Wrap raw interleaved PCM described by `format`.
    ///
    /// `frames` is the declared length if known; it is only used for the
    /// length check and capacity hints.
    pub fn raw<R: Read + Send + 'static>(format: PcmFormat, reader: R, frames: Option<u64>) -> Self {
        Self {
            format,
            frames,
            source: Source::Reader(Box::new(reader)),
        }
    }

    /// Decode a RIFF/WAVE container.
    ///
    /// Samples are decoded eagerly into their native width (little-endian);
    /// 8-bit WAV data, which is unsigned on disk, comes out signed.
    pub fn wav<R: Read + Send + 'static>(reader: R) -> Result<Self, ConvertError> {
        let mut wav = WavReader::new(reader).map_err(map_hound_error)?;
        let spec = wav.spec();
        let frames = u64::from(wav.duration());

        if frames > MAX_FRAMES {
            return Err(ConvertError::TooLong { frames });
        }

        let (encoding, data) = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8) => (Encoding::Signed, collect::<_, i8>(&mut wav, |s, out| {
                out.push(s as u8)
            })?),
            (SampleFormat::Int, 16) => (Encoding::Signed, collect::<_, i16>(&mut wav, |s, out| {
                out.extend_from_slice(&s.to_le_bytes())
            })?),
            (SampleFormat::Int, 24) => (Encoding::Signed, collect::<_, i32>(&mut wav, |s, out| {
                out.extend_from_slice(&s.to_le_bytes()[..3])
            })?),
            (SampleFormat::Int, 32) => (Encoding::Signed, collect::<_, i32>(&mut wav, |s, out| {
                out.extend_from_slice(&s.to_le_bytes())
            })?),
            (SampleFormat::Float, 32) => (Encoding::Float, collect::<_, f32>(&mut wav, |s, out| {
                out.extend_from_slice(&s.to_le_bytes())
            })?),
            (format, bits) => {
                return Err(ConvertError::UnsupportedFormat(format!(
                    "{bits}-bit {format:?} WAV samples"
                )));
            }
        };

        let format = PcmFormat {
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            channels: spec.channels,
            encoding,
            big_endian: false,
        };
        debug!("Decoded WAV: {} ({} frames)", format, frames);

        Ok(Self {
            format,
            frames: Some(frames),
            source: Source::Decoded(data),
        })
    }

    /// Sniff the container and decode it.
    ///
    /// Only RIFF/WAVE is recognized; everything else is an unsupported format.
    pub fn open<R: Read + Send + 'static>(mut reader: R) -> Result<Self, ConvertError> {
        let mut header = [0u8; 12];
        let mut filled = 0;
        while filled < header.len() {
            match reader.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == header.len() && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
            let rewound = Cursor::new(header).chain(reader);
            return Self::wav(rewound);
        }

        Err(ConvertError::UnsupportedFormat(
            "stream is not a RIFF/WAVE container".to_string(),
        ))
    }

    /// Format of the bytes this stream yields
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Declared length in frames, if known
    pub fn frames(&self) -> Option<u64> {
        self.frames
    }

    /// Read the stream to its end.
    ///
    /// Decoded WAV data is moved out as is. Running out of memory is an
    /// `OutOfMemory` error rather than an abort.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let reader = match &mut self.source {
            Source::Decoded(data) => return Ok(mem::take(data)),
            Source::Reader(reader) => reader,
        };

        let hint = self
            .frames
            .and_then(|f| usize::try_from(f).ok())
            .and_then(|f| f.checked_mul(self.format.frame_size()))
            .unwrap_or(0);
        let mut data = Vec::new();
        reserve(&mut data, hint.min(MAX_PREALLOC))?;

        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    reserve(&mut data, n)?;
                    data.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(data)
    }
}

fn reserve(data: &mut Vec<u8>, additional: usize) -> io::Result<()> {
    data.try_reserve(additional)
        .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))
}

/// Drain every sample of a WAV reader into bytes
fn collect<R: Read, S: hound::Sample>(
    wav: &mut WavReader<R>,
    mut put: impl FnMut(S, &mut Vec<u8>),
) -> Result<Vec<u8>, ConvertError> {
    let spec = wav.spec();
    let width = usize::from(spec.bits_per_sample).div_ceil(8);
    // The header's length is untrusted until the samples actually arrive
    let hint = (wav.len() as usize).saturating_mul(width).min(MAX_PREALLOC);
    let mut out = Vec::new();
    reserve(&mut out, hint)?;
    for sample in wav.samples::<S>() {
        if out.capacity() - out.len() < width {
            reserve(&mut out, width)?;
        }
        put(sample.map_err(map_hound_error)?, &mut out);
    }
    Ok(out)
}

fn map_hound_error(err: hound::Error) -> ConvertError {
    match err {
        hound::Error::IoError(e) => ConvertError::Io(e),
        other => ConvertError::UnsupportedFormat(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: hound::WavSpec, write: impl FnOnce(&mut hound::WavWriter<&mut Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_open_wav_16bit_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| {
            w.write_sample(1000i16).unwrap();
            w.write_sample(-1000i16).unwrap();
        });

        let mut stream = PcmStream::open(Cursor::new(bytes)).unwrap();
        assert!(stream.format().matches(&PcmFormat::INTERNAL));
        assert_eq!(stream.frames(), Some(1));

        let data = stream.read_all().unwrap();
        assert_eq!(data, [1000i16.to_le_bytes(), (-1000i16).to_le_bytes()].concat());
    }

    #[test]
    fn test_open_wav_8bit_comes_out_signed() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 8,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| {
            w.write_sample(-128i8).unwrap();
            w.write_sample(127i8).unwrap();
        });

        let mut stream = PcmStream::open(Cursor::new(bytes)).unwrap();
        assert!(stream.format().matches(&PcmFormat::MONO_8));
        assert_eq!(stream.read_all().unwrap(), vec![0x80, 0x7F]);
    }

    #[test]
    fn test_open_rejects_unknown_container() {
        let err = PcmStream::open(Cursor::new(b"OggS\0\0\0\0\0\0\0\0".to_vec())).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_open_rejects_short_input() {
        let err = PcmStream::open(Cursor::new(b"RIFF".to_vec())).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_decoded_wav_buffer_is_moved_out() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| {
            for s in 0..64i16 {
                w.write_sample(s).unwrap();
            }
        });

        let mut stream = PcmStream::open(Cursor::new(bytes)).unwrap();
        let decoded = match &stream.source {
            Source::Decoded(data) => data.as_ptr(),
            Source::Reader(_) => panic!("WAV data should be decoded up front"),
        };

        let data = stream.read_all().unwrap();
        assert_eq!(data.len(), 128);
        assert_eq!(data.as_ptr(), decoded);
        assert!(stream.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_declared_length_is_not_preallocated() {
        let mut stream = PcmStream::raw(PcmFormat::INTERNAL, Cursor::new(vec![7u8; 8]), Some(MAX_FRAMES));
        let data = stream.read_all().unwrap();
        assert_eq!(data, vec![7u8; 8]);
        assert!(data.capacity() <= MAX_PREALLOC);
    }

    #[test]
    fn test_wav_header_length_is_not_preallocated() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut bytes = wav_bytes(spec, |w| {
            w.write_sample(5i16).unwrap();
            w.write_sample(-5i16).unwrap();
        });
        // Claim a data chunk far larger than what follows
        let len_at = bytes.windows(4).position(|w| w == b"data").unwrap() + 4;
        bytes[len_at..len_at + 4].copy_from_slice(&0x7FFF_FFF0u32.to_le_bytes());

        // Truncated data is an error or a short read, never an abort
        if let Ok(mut stream) = PcmStream::open(Cursor::new(bytes)) {
            assert!(stream.read_all().unwrap().len() <= 4);
        }
    }

    #[test]
    fn test_read_all_raw() {
        let mut stream = PcmStream::raw(PcmFormat::MONO_16, Cursor::new(vec![1, 2, 3, 4]), None);
        assert_eq!(stream.read_all().unwrap(), vec![1, 2, 3, 4]);
        assert!(stream.read_all().unwrap().is_empty());
    }
}
