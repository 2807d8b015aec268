//! Mixing engine tests

use super::*;
use crate::source::{MemoryCursor, SampleCursor};
use tiny_pcm::ChannelData;

// ============================================================================
// Helpers
// ============================================================================

fn cursor(frames: &[(i16, i16)]) -> Box<dyn SampleCursor> {
    let bytes: Vec<u8> = frames
        .iter()
        .flat_map(|(l, r)| [l.to_le_bytes(), r.to_le_bytes()].concat())
        .collect();
    Box::new(MemoryCursor::new(ChannelData::from_interleaved(&bytes)))
}

fn constant(frames: usize, left: i16, right: i16) -> Box<dyn SampleCursor> {
    cursor(&vec![(left, right); frames])
}

fn playing_music(cursor: Box<dyn SampleCursor>) -> SourceReference {
    let mut music = SourceReference::music(cursor);
    music.set_playing(true);
    music
}

fn frames_of(bytes: &[u8]) -> Vec<(i16, i16)> {
    bytes
        .chunks_exact(FRAME_SIZE)
        .map(|f| {
            (
                i16::from_le_bytes([f[0], f[1]]),
                i16::from_le_bytes([f[2], f[3]]),
            )
        })
        .collect()
}

// ============================================================================
// Read
// ============================================================================

#[test]
fn test_empty_mixer_produces_nothing() {
    let mixer = Mixer::new(1.0);
    let mut out = [0xAAu8; 16];
    assert_eq!(mixer.read(&mut out), 0);
    assert_eq!(out, [0xAA; 16]);
}

#[test]
fn test_half_volume_music_scenario() {
    let mixer = Mixer::new(1.0);
    let frames: Vec<(i16, i16)> = (1..=8).map(|i| (i * 100, -i * 100)).collect();
    let mut music = playing_music(cursor(&frames));
    music.set_volume(0.5);
    let key = mixer.register_music(music).unwrap();

    let mut out = [0u8; 4 * FRAME_SIZE];
    assert_eq!(mixer.read(&mut out), 16);
    assert_eq!(
        frames_of(&out),
        vec![(50, -50), (100, -100), (150, -150), (200, -200)]
    );

    // The other four frames are still queued
    let remaining = mixer.with_music(key, |m| m.bytes_available()).unwrap();
    assert_eq!(remaining, 4 * FRAME_SIZE as u64);
}

#[test]
fn test_global_volume_scales_music() {
    let mixer = Mixer::new(0.5);
    let mut music = playing_music(constant(2, 1000, 1000));
    music.set_volume(0.5);
    mixer.register_music(music).unwrap();

    let mut out = [0u8; 8];
    mixer.read(&mut out);
    assert_eq!(frames_of(&out), vec![(250, 250), (250, 250)]);
}

#[test]
fn test_two_sources_sum() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(2, 1000, -1000))).unwrap();
    mixer.register_sound(SourceReference::sound(constant(2, 1000, -1000), 0, 1.0, 0.0));

    let mut out = [0u8; 8];
    assert_eq!(mixer.read(&mut out), 8);
    assert_eq!(frames_of(&out), vec![(2000, -2000), (2000, -2000)]);
}

#[test]
fn test_sum_clips_to_16_bit() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(1, 20000, -20000))).unwrap();
    mixer.register_music(playing_music(constant(1, 20000, -20000))).unwrap();

    let mut out = [0u8; 4];
    mixer.read(&mut out);
    assert_eq!(frames_of(&out), vec![(i16::MAX, i16::MIN)]);
}

#[test]
fn test_pan_extremes() {
    let mixer = Mixer::new(1.0);
    mixer.register_sound(SourceReference::sound(constant(1, 100, 200), 0, 1.0, -1.0));
    let mut out = [0u8; 4];
    mixer.read(&mut out);
    assert_eq!(frames_of(&out), vec![(300, 0)]);

    mixer.register_sound(SourceReference::sound(constant(1, 100, 200), 0, 1.0, 1.0));
    mixer.read(&mut out);
    assert_eq!(frames_of(&out), vec![(0, 300)]);

    mixer.register_sound(SourceReference::sound(constant(1, 100, 200), 0, 1.0, 0.0));
    mixer.read(&mut out);
    assert_eq!(frames_of(&out), vec![(100, 200)]);
}

#[test]
fn test_zero_global_volume_still_produces_frames() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(3, 5000, 5000))).unwrap();
    mixer.set_volume(0.0);

    let mut out = [0xFFu8; 12];
    assert_eq!(mixer.read(&mut out), 12);
    assert_eq!(out, [0u8; 12]);
}

#[test]
fn test_read_short_only_when_silent() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(3, 1, 1))).unwrap();

    let mut out = [0u8; 5 * FRAME_SIZE];
    assert_eq!(mixer.read(&mut out), 3 * FRAME_SIZE);

    // Nothing left at all
    assert_eq!(mixer.read(&mut out), 0);
}

#[test]
fn test_read_never_exceeds_request() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(100, 1, 1))).unwrap();

    // Partial trailing frame stays untouched
    let mut out = [0xEEu8; 10];
    assert_eq!(mixer.read(&mut out), 8);
    assert_eq!(&out[8..], &[0xEE, 0xEE]);
}

#[test]
fn test_paused_music_is_not_read() {
    let mixer = Mixer::new(1.0);
    let key = mixer
        .register_music(SourceReference::music(constant(4, 9, 9)))
        .unwrap();

    let mut out = [0u8; 8];
    assert_eq!(mixer.read(&mut out), 0);
    assert_eq!(mixer.with_music(key, |m| m.bytes_available()), Some(16));
}

#[test]
fn test_looping_music_never_runs_dry() {
    let mixer = Mixer::new(1.0);
    let mut music = playing_music(cursor(&[(1, 1), (2, 2)]));
    music.set_looping(true);
    mixer.register_music(music).unwrap();

    let mut out = [0u8; 5 * FRAME_SIZE];
    assert_eq!(mixer.read(&mut out), 5 * FRAME_SIZE);
    assert_eq!(
        frames_of(&out),
        vec![(1, 1), (2, 2), (1, 1), (2, 2), (1, 1)]
    );
}

// ============================================================================
// Sound lifecycle
// ============================================================================

#[test]
fn test_finished_sound_is_removed() {
    let mixer = Mixer::new(1.0);
    mixer.register_sound(SourceReference::sound(constant(2, 1, 1), 0, 1.0, 0.0));

    let mut out = [0u8; 8];
    assert_eq!(mixer.read(&mut out), 8);
    assert_eq!(mixer.sound_count(), 0);
}

#[test]
fn test_empty_sound_removed_by_one_read() {
    let mixer = Mixer::new(1.0);
    mixer.register_sound(SourceReference::sound(constant(0, 0, 0), 0, 1.0, 0.0));
    assert_eq!(mixer.sound_count(), 1);

    let mut out = [0u8; 4];
    assert_eq!(mixer.read(&mut out), 0);
    assert_eq!(mixer.sound_count(), 0);
}

#[test]
fn test_empty_sound_removed_by_one_skip() {
    let mixer = Mixer::new(1.0);
    mixer.register_sound(SourceReference::sound(constant(0, 0, 0), 0, 1.0, 0.0));
    mixer.skip(0);
    assert_eq!(mixer.sound_count(), 0);
}

#[test]
fn test_unregister_all_sounds_by_id() {
    let mixer = Mixer::new(1.0);
    mixer.register_sound(SourceReference::sound(constant(4, 1, 1), 1, 1.0, 0.0));
    mixer.register_sound(SourceReference::sound(constant(4, 1, 1), 2, 1.0, 0.0));
    mixer.register_sound(SourceReference::sound(constant(4, 1, 1), 1, 1.0, 0.0));

    assert_eq!(mixer.unregister_all_sounds(1), 2);
    assert_eq!(mixer.sound_count(), 1);
    assert_eq!(mixer.unregister_all_sounds(1), 0);
}

#[test]
fn test_clear_lists() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(4, 1, 1))).unwrap();
    mixer.register_sound(SourceReference::sound(constant(4, 1, 1), 0, 1.0, 0.0));

    mixer.clear_sounds();
    assert_eq!(mixer.sound_count(), 0);
    assert_eq!(mixer.music_count(), 1);

    mixer.clear_music();
    assert_eq!(mixer.music_count(), 0);
}

#[test]
fn test_unregister_music() {
    let mixer = Mixer::new(1.0);
    let key = mixer.register_music(playing_music(constant(4, 1, 1))).unwrap();
    assert!(mixer.unregister_music(key));
    assert!(!mixer.unregister_music(key));
    assert_eq!(mixer.with_music(key, |_| ()), None);
}

#[test]
fn test_closed_mixer_refuses_sources() {
    let mixer = Mixer::new(1.0);
    mixer.register_music(playing_music(constant(4, 1, 1))).unwrap();
    mixer.close();

    assert!(mixer.is_closed());
    assert_eq!(mixer.music_count(), 0);
    assert!(mixer.register_music(playing_music(constant(4, 1, 1))).is_none());
    assert!(!mixer.register_sound(SourceReference::sound(constant(4, 1, 1), 0, 1.0, 0.0)));
}

// ============================================================================
// Volume
// ============================================================================

#[test]
fn test_negative_volume_ignored() {
    let mixer = Mixer::new(0.75);
    mixer.set_volume(-0.5);
    assert_eq!(mixer.volume(), 0.75);
    mixer.set_volume(2.0);
    assert_eq!(mixer.volume(), 2.0);

    assert_eq!(Mixer::new(-1.0).volume(), 1.0);
}

// ============================================================================
// Skip
// ============================================================================

#[test]
fn test_skip_matches_discarded_read() {
    let frames: Vec<(i16, i16)> = (0..10).map(|i| (i, -i)).collect();

    let skipped = Mixer::new(1.0);
    skipped.register_music(playing_music(cursor(&frames))).unwrap();
    skipped.register_sound(SourceReference::sound(cursor(&frames), 3, 1.0, 0.0));

    let discarded = Mixer::new(1.0);
    discarded.register_music(playing_music(cursor(&frames))).unwrap();
    discarded.register_sound(SourceReference::sound(cursor(&frames), 3, 1.0, 0.0));

    skipped.skip(3 * FRAME_SIZE as u64);
    let mut scratch = [0u8; 3 * FRAME_SIZE];
    discarded.read(&mut scratch);

    let mut a = [0u8; 10 * FRAME_SIZE];
    let mut b = [0u8; 10 * FRAME_SIZE];
    let read_a = skipped.read(&mut a);
    let read_b = discarded.read(&mut b);
    assert_eq!(read_a, 7 * FRAME_SIZE);
    assert_eq!(read_a, read_b);
    assert_eq!(a, b);
}

#[test]
fn test_skip_leaves_paused_music() {
    let mixer = Mixer::new(1.0);
    let key = mixer
        .register_music(SourceReference::music(constant(4, 1, 1)))
        .unwrap();
    mixer.skip(8);
    assert_eq!(mixer.with_music(key, |m| m.bytes_available()), Some(16));
}

#[test]
fn test_skip_past_end_removes_sound() {
    let mixer = Mixer::new(1.0);
    mixer.register_sound(SourceReference::sound(constant(4, 1, 1), 0, 1.0, 0.0));
    mixer.skip(1000);
    assert_eq!(mixer.sound_count(), 0);
}
