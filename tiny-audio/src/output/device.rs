//! Hardware output line using cpal and a ring buffer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use tiny_pcm::{BYTES_PER_SAMPLE, CHANNELS, FRAME_SIZE, SAMPLE_RATE};
use tracing::{debug, error, info, warn};

use super::OutputLine;
use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};

/// How long one wait for ring space lasts before re-checking
const WAIT_SLICE: Duration = Duration::from_millis(5);

/// A write that makes no progress for this long means the device stalled
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Signal from the device callback: space was freed
type SpaceSignal = Arc<(Mutex<()>, Condvar)>;

/// An open device stream fed through an SPSC ring of i16 samples.
///
/// `write` is the back-pressure point: it blocks until the device callback
/// has drained enough of the ring.
pub struct DeviceLine {
    producer: HeapProd<i16>,
    signal: SpaceSignal,
    /// Set by the error callback when the device goes away
    lost: Arc<AtomicBool>,
    /// Conversion scratch, reused across writes
    samples: Vec<i16>,
    capacity: usize,
    name: String,
    stream: cpal::Stream,
}

impl DeviceLine {
    /// Open `device` at 44.1 kHz stereo with a ring of `capacity` samples
    pub fn open(device: &cpal::Device, capacity: usize) -> Result<Self, String> {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let range = device
            .supported_output_configs()
            .map_err(|e| format!("Failed to query output configs: {}", e))?
            .filter(|c| c.channels() == CHANNELS)
            .filter(|c| {
                c.min_sample_rate() <= cpal::SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= cpal::SampleRate(SAMPLE_RATE)
            })
            .filter(|c| {
                matches!(
                    c.sample_format(),
                    cpal::SampleFormat::I16 | cpal::SampleFormat::F32
                )
            })
            // Prefer native 16-bit over float
            .min_by_key(|c| c.sample_format() != cpal::SampleFormat::I16)
            .ok_or_else(|| format!("{} does not support {} Hz 16-bit stereo", name, SAMPLE_RATE))?;
        let config = range.with_sample_rate(cpal::SampleRate(SAMPLE_RATE));
        let sample_format = config.sample_format();

        let ring = HeapRb::<i16>::new(capacity);
        let (producer, mut consumer) = ring.split();

        let signal: SpaceSignal = Arc::new((Mutex::new(()), Condvar::new()));
        let lost = Arc::new(AtomicBool::new(false));

        let error_callback = {
            let lost = lost.clone();
            let signal = signal.clone();
            move |err: cpal::StreamError| {
                error!("Audio stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    lost.store(true, Ordering::Release);
                    signal.1.notify_all();
                }
            }
        };

        let callback_signal = signal.clone();
        let stream = match sample_format {
            cpal::SampleFormat::I16 => device
                .build_output_stream(
                    &config.into(),
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let popped = consumer.pop_slice(data);
                        data[popped..].fill(0);
                        callback_signal.1.notify_one();
                    },
                    error_callback,
                    None,
                )
                .map_err(|e| format!("Failed to build audio stream: {}", e))?,
            cpal::SampleFormat::F32 => {
                let mut temp_buffer: Vec<i16> = vec![0; 4096];
                device
                    .build_output_stream(
                        &config.into(),
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            if temp_buffer.len() < data.len() {
                                temp_buffer.resize(data.len(), 0);
                            }
                            let popped = consumer.pop_slice(&mut temp_buffer[..data.len()]);
                            for (out, &s) in data.iter_mut().zip(&temp_buffer[..popped]) {
                                *out = f32::from(s) / 32768.0;
                            }
                            data[popped..].fill(0.0);
                            callback_signal.1.notify_one();
                        },
                        error_callback,
                        None,
                    )
                    .map_err(|e| format!("Failed to build audio stream: {}", e))?
            }
            other => return Err(format!("Unsupported sample format: {:?}", other)),
        };

        stream
            .play()
            .map_err(|e| format!("Failed to play audio stream: {}", e))?;

        debug!("Audio stream started on {} ({:?})", name, sample_format);

        Ok(Self {
            producer,
            signal,
            lost,
            samples: Vec::with_capacity(capacity),
            capacity,
            name,
            stream,
        })
    }

    /// Device name as reported by the host
    pub fn name(&self) -> &str {
        &self.name
    }

    fn wait_for_space(&self) {
        let (lock, cvar) = &*self.signal;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = cvar.wait_timeout(guard, WAIT_SLICE);
    }

    fn check_lost(&self) -> AudioResult<()> {
        if self.lost.load(Ordering::Acquire) {
            Err(AudioError::Output(format!("{} is no longer available", self.name)))
        } else {
            Ok(())
        }
    }
}

impl OutputLine for DeviceLine {
    fn write(&mut self, bytes: &[u8]) -> AudioResult<usize> {
        self.check_lost()?;

        let whole = bytes.len() - bytes.len() % FRAME_SIZE;
        self.samples.clear();
        self.samples.extend(
            bytes[..whole]
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );

        let mut offset = 0;
        let mut last_progress = Instant::now();
        while offset < self.samples.len() {
            let pushed = self.producer.push_slice(&self.samples[offset..]);
            if pushed > 0 {
                offset += pushed;
                last_progress = Instant::now();
                continue;
            }

            self.check_lost()?;
            if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(AudioError::Output(format!(
                    "{} stopped consuming audio",
                    self.name
                )));
            }
            self.wait_for_space();
        }

        Ok(whole)
    }

    fn flush(&mut self) {
        let deadline = Instant::now()
            + Duration::from_secs_f64(self.capacity as f64 / f64::from(SAMPLE_RATE))
            + STALL_TIMEOUT;
        while !self.producer.is_empty() && Instant::now() < deadline {
            if self.lost.load(Ordering::Acquire) {
                return;
            }
            self.wait_for_space();
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            debug!("Failed to pause audio stream: {}", e);
        }
    }
}

/// Find and open an output line that accepts the internal format.
///
/// Candidates are tried in order: the configured device (if any), the
/// host's default device, then every other output device.
pub fn acquire_output_line(config: &AudioConfig) -> AudioResult<DeviceLine> {
    let host = cpal::default_host();
    let capacity = config.ring_buffer_samples();

    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let mut devices: Vec<(String, cpal::Device)> = match host.output_devices() {
        Ok(devices) => devices
            .map(|d| (d.name().unwrap_or_default(), d))
            .collect(),
        Err(e) => {
            warn!("Failed to enumerate output devices: {}", e);
            Vec::new()
        }
    };
    if devices.is_empty() {
        if let Some(device) = host.default_output_device() {
            devices.push((default_name.clone().unwrap_or_default(), device));
        }
    }

    // Stable sort keeps host order within each rank
    devices.sort_by_key(|(name, _)| {
        if config.device.as_deref() == Some(name.as_str()) {
            0
        } else if default_name.as_deref() == Some(name.as_str()) {
            1
        } else {
            2
        }
    });

    if let Some(wanted) = config.device.as_deref() {
        if !devices.iter().any(|(name, _)| name == wanted) {
            warn!("Configured audio device '{}' not found, using default", wanted);
        }
    }

    for (name, device) in &devices {
        match DeviceLine::open(device, capacity) {
            Ok(line) => {
                info!("Audio output: {}", name);
                return Ok(line);
            }
            Err(e) => debug!("Skipping audio device {}: {}", name, e),
        }
    }

    Err(AudioError::DeviceUnavailable(format!(
        "none of {} output devices supports {} Hz 16-bit stereo",
        devices.len(),
        SAMPLE_RATE
    )))
}
