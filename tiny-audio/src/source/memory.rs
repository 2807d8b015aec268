//! Memory-backed cursor over decoded channel buffers

use tiny_pcm::{BYTES_PER_SAMPLE, ChannelData, FRAME_SIZE};

use super::SampleCursor;

/// Reads frames from shared left/right buffers.
///
/// `position` indexes the channel buffers (2 bytes per frame per channel).
pub struct MemoryCursor {
    data: ChannelData,
    position: usize,
    disposed: bool,
}

impl MemoryCursor {
    pub fn new(data: ChannelData) -> Self {
        Self {
            data,
            position: 0,
            disposed: false,
        }
    }

    fn end(&self) -> usize {
        // Whole frames only
        self.data.bytes_per_channel() - self.data.bytes_per_channel() % BYTES_PER_SAMPLE
    }
}

#[inline]
fn sample_at(buffer: &[u8], index: usize) -> i32 {
    i32::from(i16::from_le_bytes([buffer[index], buffer[index + 1]]))
}

impl SampleCursor for MemoryCursor {
    fn bytes_available(&self) -> u64 {
        ((self.end() - self.position) / BYTES_PER_SAMPLE * FRAME_SIZE) as u64
    }

    fn total_frames(&self) -> u64 {
        (self.end() / BYTES_PER_SAMPLE) as u64
    }

    fn next_frame(&mut self, out: &mut [i32; 2]) {
        if self.position >= self.end() {
            *out = [0, 0];
            return;
        }
        out[0] = sample_at(self.data.left(), self.position);
        out[1] = sample_at(self.data.right(), self.position);
        self.position += BYTES_PER_SAMPLE;
    }

    fn skip_bytes(&mut self, bytes: u64) {
        let frames = usize::try_from(bytes / FRAME_SIZE as u64).unwrap_or(usize::MAX);
        let advance = frames.saturating_mul(BYTES_PER_SAMPLE);
        self.position = self.position.saturating_add(advance).min(self.end());
    }

    fn seek_frame(&mut self, frame: u64) {
        if self.disposed {
            return;
        }
        let index = usize::try_from(frame)
            .unwrap_or(usize::MAX)
            .saturating_mul(BYTES_PER_SAMPLE);
        self.position = index.min(self.end());
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.position = self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: &[(i16, i16)]) -> ChannelData {
        let bytes: Vec<u8> = frames
            .iter()
            .flat_map(|(l, r)| [l.to_le_bytes(), r.to_le_bytes()].concat())
            .collect();
        ChannelData::from_interleaved(&bytes)
    }

    #[test]
    fn test_reads_sign_extended_pairs() {
        let mut cursor = MemoryCursor::new(stereo(&[(-1, 32767), (-32768, 5)]));
        let mut buf = [0i32; 2];

        assert_eq!(cursor.bytes_available(), 8);
        cursor.next_frame(&mut buf);
        assert_eq!(buf, [-1, 32767]);
        cursor.next_frame(&mut buf);
        assert_eq!(buf, [-32768, 5]);
        assert_eq!(cursor.bytes_available(), 0);
    }

    #[test]
    fn test_exhausted_reads_silence() {
        let mut cursor = MemoryCursor::new(stereo(&[(9, 9)]));
        let mut buf = [0i32; 2];
        cursor.next_frame(&mut buf);
        cursor.next_frame(&mut buf);
        assert_eq!(buf, [0, 0]);
        assert_eq!(cursor.bytes_available(), 0);
    }

    #[test]
    fn test_skip_counts_interleaved_bytes() {
        let mut cursor = MemoryCursor::new(stereo(&[(1, 1), (2, 2), (3, 3), (4, 4)]));
        cursor.skip_bytes(8);
        assert_eq!(cursor.bytes_available(), 8);

        let mut buf = [0i32; 2];
        cursor.next_frame(&mut buf);
        assert_eq!(buf, [3, 3]);

        cursor.skip_bytes(u64::MAX);
        assert_eq!(cursor.bytes_available(), 0);
    }

    #[test]
    fn test_mono_feeds_both_channels() {
        let data = ChannelData::from_mono([100i16, -100].iter().flat_map(|v| v.to_le_bytes()).collect());
        let mut cursor = MemoryCursor::new(data);
        let mut buf = [0i32; 2];
        cursor.next_frame(&mut buf);
        assert_eq!(buf, [100, 100]);
    }

    #[test]
    fn test_dispose_ignores_seek() {
        let mut cursor = MemoryCursor::new(stereo(&[(1, 1), (2, 2)]));
        cursor.dispose();
        cursor.seek_frame(0);
        assert_eq!(cursor.bytes_available(), 0);
    }
}
