//! Discarding output line for headless runs

use std::thread;
use std::time::{Duration, Instant};

use tiny_pcm::{FRAME_SIZE, SAMPLE_RATE};

use super::OutputLine;
use crate::error::AudioResult;

/// Accepts and drops audio, blocking so that writes never run more than
/// `lead` ahead of real time (the way a device buffer would).
pub struct NullLine {
    started: Option<Instant>,
    frames_written: u64,
    lead: Duration,
}

impl NullLine {
    pub fn new(lead: Duration) -> Self {
        Self {
            started: None,
            frames_written: 0,
            lead,
        }
    }

    /// Frames accepted so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl OutputLine for NullLine {
    fn write(&mut self, bytes: &[u8]) -> AudioResult<usize> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let frames = bytes.len() / FRAME_SIZE;
        self.frames_written += frames as u64;

        let due = started + Duration::from_secs_f64(self.frames_written as f64 / f64::from(SAMPLE_RATE));
        let now = Instant::now();
        if let Some(ahead) = due.checked_duration_since(now) {
            if ahead > self.lead {
                thread::sleep(ahead - self.lead);
            }
        }

        Ok(frames * FRAME_SIZE)
    }

    fn stop(&mut self) {
        self.started = None;
        self.frames_written = 0;
    }
}
