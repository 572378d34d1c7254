//! # mp3sndfile
//!
//! Sample-accurate sound-file reading for MP3 streams.
//!
//! MP3 decoders are frame-quantized: they produce and reposition on
//! whole decoder frames (1152 samples per channel for MPEG-1 Layer III),
//! never on arbitrary sample offsets. This crate builds an exact-count
//! read/seek interface on top of that, using a rolling sample queue to
//! absorb the mismatch between what the decoder produces and what the
//! caller asked for. Non-MP3 files are served through a fallback reader
//! with the same capability set, so callers can treat both uniformly.
//!
//! # Example
//!
//! ```no_run
//! use std::io::SeekFrom;
//! use mp3sndfile::{SoundFile, SoundRead};
//!
//! let mut sound = SoundFile::open("track.mp3")?;
//! println!("{} Hz, {}", sound.samplerate(), sound.encoding());
//!
//! // Land on an exact sample-frame and read exactly one second.
//! sound.seek(SeekFrom::Start(44100))?;
//! let second: Vec<f32> = sound.read_frames(44100)?;
//! assert_eq!(second.len(), 44100 * sound.channels() as usize);
//! # Ok::<(), mp3sndfile::Error>(())
//! ```

mod buffer;
mod decoder;
mod dispatch;
mod error;
mod generic;
mod mpeg;
mod reader;
mod sample;

pub use dispatch::{read_file, Mode, SoundFile, SoundRead};
pub use error::{Error, Result};
pub use generic::GenericReader;
pub use reader::{Mp3Reader, ReaderOptions};
pub use sample::Sample;
