//! tiny-play - command line player for the tiny-audio mixer
//!
//! # Usage
//!
//! ```bash
//! tiny-play theme.wav
//! tiny-play theme.wav --loop --seconds 30
//! tiny-play theme.wav --sound jump.wav --sound coin.wav --pan -0.5
//! tiny-play theme.wav --stream --null
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use tiny_audio::{Audio, OutputBackend, Residency, config};
use tiny_pcm::PcmStream;

#[derive(Parser)]
#[command(name = "tiny-play")]
#[command(author, version, about = "Play audio files through the tiny-audio mixer")]
struct Args {
    /// Music files, mixed together
    music: Vec<PathBuf>,

    /// Sound effects, fired once at startup
    #[arg(long, short = 'S', value_name = "FILE")]
    sound: Vec<PathBuf>,

    /// Stream from spool files instead of memory
    #[arg(long)]
    stream: bool,

    /// Global volume (0.0 and up)
    #[arg(long, short = 'v')]
    volume: Option<f64>,

    /// Pan for every source (-1.0 left to 1.0 right)
    #[arg(long, short = 'p', default_value = "0.0", allow_hyphen_values = true)]
    pan: f64,

    /// Loop music
    #[arg(long, short = 'l')]
    r#loop: bool,

    /// Stop after this many seconds (default: when everything has finished)
    #[arg(long, short = 's')]
    seconds: Option<f64>,

    /// Discard output instead of opening a device
    #[arg(long)]
    null: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn open(path: &Path) -> Result<PcmStream> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    PcmStream::open(BufReader::new(file)).with_context(|| format!("Failed to decode {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.music.is_empty() && args.sound.is_empty() {
        anyhow::bail!("Nothing to play: pass at least one music file or --sound");
    }
    let limit = args
        .seconds
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("--seconds must be a non-negative number")?;

    let mut settings = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    if let Some(volume) = args.volume {
        settings.global_volume = volume;
    }
    if args.null {
        settings.backend = OutputBackend::Null;
    }
    let residency = if args.stream || settings.stream_from_file {
        Residency::Stream
    } else {
        Residency::Memory
    };

    let audio = Audio::new();
    audio.init_with(settings).context("Failed to start audio")?;

    let mut tracks = Vec::new();
    for path in &args.music {
        let music = audio
            .load_music_with(open(path)?, residency)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        music.set_pan(args.pan);
        music.play(args.r#loop);
        tracks.push(music);
    }

    for path in &args.sound {
        let sound = audio
            .load_sound_with(open(path)?, residency)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        sound.play_with(1.0, args.pan);
    }

    let started = Instant::now();
    loop {
        thread::sleep(Duration::from_millis(50));

        if let Some(limit) = limit {
            if started.elapsed() >= limit {
                break;
            }
        } else if tracks.iter().all(|m| m.done()) && audio.active_sounds() == 0 {
            // Let the device drain what was already written
            thread::sleep(Duration::from_millis(150));
            break;
        }

        if !audio.is_updating() {
            anyhow::bail!("Audio update thread stopped unexpectedly");
        }
    }

    audio.shutdown();
    Ok(())
}
