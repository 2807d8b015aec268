//! File-backed cursor over a spooled, interleaved resource

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use tiny_pcm::FRAME_SIZE;
use tracing::warn;

use super::SampleCursor;
use crate::spool::SpoolFile;

/// Read buffer per open stream (64 KiB, ~370 ms of audio)
const READ_BUFFER: usize = 64 * 1024;

/// Streams frames from a spool file.
///
/// A read or seek failure disposes the cursor; it then behaves as exhausted.
pub struct StreamCursor {
    // Keeps the spool file alive while this cursor reads it
    _file: SpoolFile,
    reader: Option<BufReader<File>>,
    /// Interleaved byte offset
    position: u64,
    len: u64,
}

impl StreamCursor {
    pub fn open(file: SpoolFile) -> io::Result<Self> {
        let reader = BufReader::with_capacity(READ_BUFFER, file.open()?);
        let len = file.len() - file.len() % FRAME_SIZE as u64;
        Ok(Self {
            _file: file,
            reader: Some(reader),
            position: 0,
            len,
        })
    }

    fn fail(&mut self, action: &str, err: io::Error) {
        warn!("Streamed audio {} failed, stopping source: {}", action, err);
        self.dispose();
    }
}

impl SampleCursor for StreamCursor {
    fn bytes_available(&self) -> u64 {
        if self.reader.is_some() {
            self.len - self.position
        } else {
            0
        }
    }

    fn total_frames(&self) -> u64 {
        self.len / FRAME_SIZE as u64
    }

    fn next_frame(&mut self, out: &mut [i32; 2]) {
        *out = [0, 0];
        if self.position >= self.len {
            return;
        }
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        let mut frame = [0u8; FRAME_SIZE];
        match reader.read_exact(&mut frame) {
            Ok(()) => {
                out[0] = i32::from(i16::from_le_bytes([frame[0], frame[1]]));
                out[1] = i32::from(i16::from_le_bytes([frame[2], frame[3]]));
                self.position += FRAME_SIZE as u64;
            }
            Err(e) => self.fail("read", e),
        }
    }

    fn skip_bytes(&mut self, bytes: u64) {
        let whole = bytes - bytes % FRAME_SIZE as u64;
        let step = whole.min(self.len - self.position);
        if step == 0 {
            return;
        }
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        let offset = i64::try_from(step).unwrap_or(i64::MAX);
        match reader.seek_relative(offset) {
            Ok(()) => self.position += step,
            Err(e) => self.fail("skip", e),
        }
    }

    fn seek_frame(&mut self, frame: u64) {
        let target = frame.saturating_mul(FRAME_SIZE as u64).min(self.len);
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        match reader.seek(SeekFrom::Start(target)) {
            Ok(_) => self.position = target,
            Err(e) => self.fail("seek", e),
        }
    }

    fn dispose(&mut self) {
        self.reader = None;
        self.position = self.len;
    }
}
