//! Shared fixture builders for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One silent MPEG-1 Layer III frame: 128 kbps, 44100 Hz, no CRC,
/// zeroed side info and main data. Decodes to 1152 zero samples per
/// channel.
pub fn silent_frame(mono: bool) -> Vec<u8> {
    let mut frame = vec![0u8; 417];
    frame[0] = 0xFF;
    frame[1] = 0xFB;
    frame[2] = 0x90;
    frame[3] = if mono { 0xC0 } else { 0x00 };
    frame
}

/// Write an MP3 of `frames` silent frames into `dir`.
pub fn silent_mp3(dir: &Path, name: &str, frames: usize, mono: bool) -> PathBuf {
    let path = dir.join(name);
    let mut data = Vec::with_capacity(frames * 417);
    for _ in 0..frames {
        data.extend_from_slice(&silent_frame(mono));
    }
    fs::write(&path, data).unwrap();
    path
}

/// Write a 16-bit PCM WAV of `frames` sample-frames of a 440 Hz test
/// tone at 44100 Hz. Every channel carries the same signal.
pub fn tone_wav(dir: &Path, name: &str, frames: u32, channels: u16) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for t in 0..frames {
        let value = tone_sample(t);
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

/// The sample written at frame `t` by `tone_wav`. Kept strictly positive
/// so the PCM byte stream can never alias an MPEG sync word.
pub fn tone_sample(t: u32) -> i16 {
    let phase = t as f32 * 440.0 * 2.0 * std::f32::consts::PI / 44100.0;
    (8000.0 + phase.sin() * 6000.0) as i16
}

/// Opt-in log output for debugging test runs (RUST_LOG=debug).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
