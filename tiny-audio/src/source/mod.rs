//! Source references: the mixer's uniform view of a playing sound or track
//!
//! A [`SourceReference`] carries the playback controls (volume, pan, playing,
//! looping) and pulls frames from a [`SampleCursor`], which hides where the
//! samples live:
//!
//! - [`MemoryCursor`]: decoded left/right buffers held in memory
//! - [`StreamCursor`]: interleaved frames streamed from a spool file
//!
//! All byte counts are interleaved internal-format bytes (4 per frame).

use std::io;

use tiny_pcm::{ChannelData, FRAME_SIZE};
use tracing::warn;

use crate::spool::SpoolFile;

mod memory;
mod stream;

pub use memory::MemoryCursor;
pub use stream::StreamCursor;

/// Storage-specific read position over internal-format frames
pub trait SampleCursor: Send {
    /// Unread bytes (interleaved), never increases except on seek
    fn bytes_available(&self) -> u64;

    /// Total length of the data in frames
    fn total_frames(&self) -> u64;

    /// Write the next left/right samples (sign-extended) and advance one frame.
    ///
    /// At the end of the data this writes silence and does not advance.
    fn next_frame(&mut self, out: &mut [i32; 2]);

    /// Advance by up to `bytes`, clamping at the end of the data
    fn skip_bytes(&mut self, bytes: u64);

    /// Jump to an absolute frame (clamped to the end)
    fn seek_frame(&mut self, frame: u64);

    /// Release held resources; the cursor reads as exhausted afterwards
    fn dispose(&mut self);
}

/// Where a loaded resource's samples live
#[derive(Debug, Clone)]
pub enum Storage {
    /// Fully decoded in memory
    Memory(ChannelData),
    /// Interleaved in a spool file
    Stream(SpoolFile),
}

impl Storage {
    /// Open a fresh cursor positioned at frame 0
    pub fn open_cursor(&self) -> io::Result<Box<dyn SampleCursor>> {
        Ok(match self {
            Storage::Memory(data) => Box::new(MemoryCursor::new(data.clone())),
            Storage::Stream(file) => Box::new(StreamCursor::open(file.clone())?),
        })
    }
}

/// A playable unit registered with the mixer
pub struct SourceReference {
    cursor: Box<dyn SampleCursor>,
    volume: f64,
    pan: f64,
    playing: bool,
    looping: bool,
    loop_frame: u64,
    sound_id: Option<u32>,
}

impl SourceReference {
    /// A music reference: paused, full volume, centered
    pub fn music(cursor: Box<dyn SampleCursor>) -> Self {
        Self {
            cursor,
            volume: 1.0,
            pan: 0.0,
            playing: false,
            looping: false,
            loop_frame: 0,
            sound_id: None,
        }
    }

    /// A one-shot sound reference: playing immediately, tagged with `id`
    pub fn sound(cursor: Box<dyn SampleCursor>, id: u32, volume: f64, pan: f64) -> Self {
        let mut reference = Self::music(cursor);
        reference.sound_id = Some(id);
        reference.playing = true;
        reference.set_volume(volume);
        reference.set_pan(pan);
        reference
    }

    /// Sequence number shared by every instance of the same sound
    pub fn sound_id(&self) -> Option<u32> {
        self.sound_id
    }

    pub fn bytes_available(&self) -> u64 {
        self.cursor.bytes_available()
    }

    /// Pull the next sample pair; wraps to the loop position when a looping
    /// reference runs out.
    pub fn next_two_bytes(&mut self, out: &mut [i32; 2]) {
        self.cursor.next_frame(out);
        if self.looping && self.cursor.bytes_available() == 0 {
            self.cursor.seek_frame(self.loop_frame);
        }
    }

    /// Drop `bytes` without producing output
    pub fn skip_bytes(&mut self, bytes: u64) {
        let available = self.cursor.bytes_available();
        if bytes < available || !self.looping {
            self.cursor.skip_bytes(bytes);
            return;
        }

        // Looping: consume the tail, then wrap around the loop region as often as needed
        let mut remaining = bytes - available;
        self.cursor.seek_frame(self.loop_frame);
        let region = self.cursor.bytes_available();
        if region == 0 {
            return;
        }
        remaining %= region;
        self.cursor.skip_bytes(remaining);
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Negative and NaN volumes are ignored
    pub fn set_volume(&mut self, volume: f64) {
        if volume >= 0.0 {
            self.volume = volume;
        }
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    /// Clamped to [-1.0, 1.0]; NaN is ignored
    pub fn set_pan(&mut self, pan: f64) {
        if !pan.is_nan() {
            self.pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn loop_frame(&self) -> u64 {
        self.loop_frame
    }

    /// Frame to wrap to when looping; out-of-range positions are ignored
    pub fn set_loop_frame(&mut self, frame: u64) {
        if frame < self.cursor.total_frames() {
            self.loop_frame = frame;
        } else {
            warn!(
                "Loop position {} is past the end ({} frames), ignored",
                frame,
                self.cursor.total_frames()
            );
        }
    }

    /// Back to frame 0
    pub fn rewind(&mut self) {
        self.cursor.seek_frame(0);
    }

    /// Current frame position
    pub fn position(&self) -> u64 {
        self.cursor.total_frames() - self.cursor.bytes_available() / FRAME_SIZE as u64
    }

    pub fn dispose(&mut self) {
        self.cursor.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(frames: usize, value: i16) -> Box<dyn SampleCursor> {
        let bytes: Vec<u8> = (0..frames).flat_map(|_| value.to_le_bytes()).collect();
        Box::new(MemoryCursor::new(ChannelData::from_mono(bytes)))
    }

    fn ramp(frames: i16) -> Box<dyn SampleCursor> {
        let bytes: Vec<u8> = (0..frames).flat_map(|v| v.to_le_bytes()).collect();
        Box::new(MemoryCursor::new(ChannelData::from_mono(bytes)))
    }

    #[test]
    fn test_music_defaults() {
        let music = SourceReference::music(constant(4, 0));
        assert!(!music.playing());
        assert_eq!(music.volume(), 1.0);
        assert_eq!(music.pan(), 0.0);
        assert_eq!(music.sound_id(), None);
    }

    #[test]
    fn test_sound_plays_immediately() {
        let sound = SourceReference::sound(constant(4, 0), 7, 0.5, -0.25);
        assert!(sound.playing());
        assert_eq!(sound.sound_id(), Some(7));
        assert_eq!(sound.volume(), 0.5);
        assert_eq!(sound.pan(), -0.25);
    }

    #[test]
    fn test_volume_rejects_negative() {
        let mut music = SourceReference::music(constant(1, 0));
        music.set_volume(-1.0);
        assert_eq!(music.volume(), 1.0);
        music.set_volume(f64::NAN);
        assert_eq!(music.volume(), 1.0);
        music.set_volume(3.0);
        assert_eq!(music.volume(), 3.0);
    }

    #[test]
    fn test_pan_clamped() {
        let mut music = SourceReference::music(constant(1, 0));
        music.set_pan(2.0);
        assert_eq!(music.pan(), 1.0);
        music.set_pan(-5.0);
        assert_eq!(music.pan(), -1.0);
        music.set_pan(f64::NAN);
        assert_eq!(music.pan(), -1.0);
    }

    #[test]
    fn test_looping_wraps_on_read() {
        let mut music = SourceReference::music(ramp(3));
        music.set_looping(true);
        music.set_loop_frame(1);

        let mut buf = [0i32; 2];
        let mut seen = Vec::new();
        for _ in 0..6 {
            music.next_two_bytes(&mut buf);
            seen.push(buf[0]);
        }
        assert_eq!(seen, vec![0, 1, 2, 1, 2, 1]);
        assert!(music.bytes_available() > 0);
    }

    #[test]
    fn test_non_looping_runs_out() {
        let mut music = SourceReference::music(ramp(2));
        let mut buf = [0i32; 2];
        music.next_two_bytes(&mut buf);
        music.next_two_bytes(&mut buf);
        assert_eq!(music.bytes_available(), 0);
    }

    #[test]
    fn test_looping_skip_wraps_many_times() {
        // 10 frames, loop region is frames 2..10 (8 frames)
        let mut music = SourceReference::music(ramp(10));
        music.set_looping(true);
        music.set_loop_frame(2);

        // 10 frames to the end, then 8 * 3 full loops, then 5 more
        music.skip_bytes((10 + 24 + 5) * FRAME_SIZE as u64);
        assert_eq!(music.position(), 7);
    }

    #[test]
    fn test_skip_clamps_without_loop() {
        let mut music = SourceReference::music(ramp(4));
        music.skip_bytes(1000);
        assert_eq!(music.bytes_available(), 0);
        assert_eq!(music.position(), 4);
    }

    #[test]
    fn test_loop_frame_out_of_range_ignored() {
        let mut music = SourceReference::music(ramp(4));
        music.set_loop_frame(4);
        assert_eq!(music.loop_frame(), 0);
        music.set_loop_frame(3);
        assert_eq!(music.loop_frame(), 3);
    }

    #[test]
    fn test_rewind() {
        let mut music = SourceReference::music(ramp(4));
        music.skip_bytes(8);
        assert_eq!(music.position(), 2);
        music.rewind();
        assert_eq!(music.position(), 0);
        assert_eq!(music.bytes_available(), 16);
    }
}
