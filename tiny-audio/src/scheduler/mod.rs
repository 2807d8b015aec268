//! Real-time update scheduler
//!
//! A dedicated thread turns elapsed wall-clock time into a frame budget,
//! pulls that many frames from the mixer and writes them to the output
//! line. Work per tick is capped; anything beyond the cap is skipped in the
//! mixer rather than mixed, so a stall never turns into growing latency.
//!
//! ```text
//! loop while running:
//!     budget += elapsed * 44100
//!     read = floor(budget), skip = 0
//!     if read > max: skip = read - max, read = max
//!     mixer.skip(skip * 4)
//!     n = mixer.read(buf[..read * 4]); zero-fill buf[n..read * 4]
//!     budget -= read + skip
//!     line.write(buf[..read * 4])      <- blocks on device back-pressure
//!     sleep(1 ms)
//! ```

mod priority;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tiny_pcm::{FRAME_SIZE, SAMPLE_RATE};
use tracing::{debug, trace, warn};

use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};
use crate::mixer::Mixer;
use crate::output::OutputLine;

/// Thread name for the update loop
pub const THREAD_NAME: &str = "tiny-audio-update";

/// Opens the output line on the update thread
pub type LineFactory = Box<dyn FnOnce() -> AudioResult<Box<dyn OutputLine>> + Send>;

// ============================================================================
// Frame clock
// ============================================================================

/// Frames to mix and frames to drop in one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickPlan {
    pub read: usize,
    pub skip: usize,
}

/// Converts elapsed time into a per-tick frame budget
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Fractional frames owed but not yet mixed
    accrued: f64,
    max_frames: usize,
}

impl FrameClock {
    pub fn new(max_frames: usize) -> Self {
        Self {
            accrued: 0.0,
            max_frames: max_frames.max(1),
        }
    }

    /// Frames still owed (fractional)
    pub fn accrued(&self) -> f64 {
        self.accrued
    }

    /// Accrue `elapsed` worth of frames and take out this tick's share
    pub fn advance(&mut self, elapsed: Duration) -> TickPlan {
        self.accrued += elapsed.as_secs_f64() * f64::from(SAMPLE_RATE);

        let mut read = self.accrued as usize;
        let mut skip = 0;
        if read > self.max_frames {
            skip = read - self.max_frames;
            read = self.max_frames;
        }

        self.accrued -= (read + skip) as f64;
        TickPlan { read, skip }
    }
}

// ============================================================================
// Tick loop
// ============================================================================

/// Logs write failures without flooding: the first one, then at most one
/// summary per interval.
struct FailureLog {
    last_report: Option<Instant>,
    suppressed: u64,
}

impl FailureLog {
    const INTERVAL: Duration = Duration::from_secs(1);

    fn new() -> Self {
        Self {
            last_report: None,
            suppressed: 0,
        }
    }

    fn record(&mut self, err: &AudioError) {
        let due = self
            .last_report
            .is_none_or(|last| last.elapsed() >= Self::INTERVAL);
        if due {
            if self.suppressed > 0 {
                warn!(
                    "Audio output write failed: {} ({} more since last report)",
                    err, self.suppressed
                );
            } else {
                warn!("Audio output write failed: {}", err);
            }
            self.last_report = Some(Instant::now());
            self.suppressed = 0;
        } else {
            self.suppressed += 1;
        }
    }
}

/// State owned by the update thread
pub struct Scheduler {
    mixer: Arc<Mixer>,
    line: Box<dyn OutputLine>,
    clock: FrameClock,
    /// Tick buffer, sized for the per-tick cap
    buffer: Vec<u8>,
    failures: FailureLog,
}

impl Scheduler {
    pub fn new(mixer: Arc<Mixer>, line: Box<dyn OutputLine>, max_frames: usize) -> Self {
        let clock = FrameClock::new(max_frames);
        let buffer = vec![0; clock.max_frames * FRAME_SIZE];
        Self {
            mixer,
            line,
            clock,
            buffer,
            failures: FailureLog::new(),
        }
    }

    /// Run one tick for `elapsed` time. Returns the bytes written to the line.
    ///
    /// Frames are consumed from the clock even if the write fails.
    pub fn tick(&mut self, elapsed: Duration) -> AudioResult<usize> {
        let plan = self.clock.advance(elapsed);

        if plan.skip > 0 {
            trace!("Update fell behind, skipping {} frames", plan.skip);
            self.mixer.skip((plan.skip * FRAME_SIZE) as u64);
        }

        if plan.read == 0 {
            return Ok(0);
        }

        let len = plan.read * FRAME_SIZE;
        let produced = self.mixer.read(&mut self.buffer[..len]);
        self.buffer[produced..len].fill(0);
        self.line.write(&self.buffer[..len])
    }

    /// Tick until `running` goes false
    fn run(mut self, running: &AtomicBool, sleep: Duration) {
        debug!("Audio update thread started");

        let mut last = Instant::now();
        while running.load(Ordering::Acquire) {
            let now = Instant::now();
            if let Err(e) = self.tick(now - last) {
                self.failures.record(&e);
            }
            last = now;
            thread::sleep(sleep);
        }

        self.line.stop();
        debug!("Audio update thread finished");
    }
}

// ============================================================================
// Thread handle
// ============================================================================

/// Handle to the running update thread.
///
/// Stopping only clears the running flag; the thread finishes its current
/// tick (including any blocked device write) and exits on its own.
pub struct SchedulerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Ask the thread to exit after its current tick. Never blocks.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the thread has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the thread is still executing
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        // Detach rather than join: the thread may be blocked in a device write
        self.stop();
    }
}

/// Start the update thread.
///
/// The output line is opened on the new thread; if that fails the thread
/// exits and the error is returned here.
pub fn spawn(mixer: Arc<Mixer>, config: &AudioConfig, open_line: LineFactory) -> AudioResult<SchedulerHandle> {
    let running = Arc::new(AtomicBool::new(true));
    let max_frames = config.max_frames_per_tick();
    let sleep = config.tick_sleep();
    let (ready_tx, ready_rx) = mpsc::sync_channel::<AudioResult<()>>(1);

    let thread_running = running.clone();
    let thread = thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || {
            priority::raise_current_thread();

            let line = match open_line() {
                Ok(line) => line,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            Scheduler::new(mixer, line, max_frames).run(&thread_running, sleep);
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(SchedulerHandle {
            running,
            thread: Some(thread),
        }),
        Ok(Err(e)) => {
            running.store(false, Ordering::Release);
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            running.store(false, Ordering::Release);
            let _ = thread.join();
            Err(AudioError::Output(
                "update thread exited before opening the output line".to_string(),
            ))
        }
    }
}
