//! Format dispatch
//!
//! One open function that tries the MP3 path first and falls back to the
//! generic reader, with both variants behind a shared capability set so
//! callers can hold either without caring which decoder backed the file.

use std::io::SeekFrom;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::generic::GenericReader;
use crate::reader::Mp3Reader;
use crate::sample::Sample;

/// File access mode. Only `Read` is supported by the readers in this
/// crate; the other variants exist so mode handling matches general
/// sound-file APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
    ReadWrite,
}

/// The capability set shared by every reader in this crate.
pub trait SoundRead {
    /// Sample rate in Hz.
    fn samplerate(&self) -> u32;
    /// Number of channels (1 or 2).
    fn channels(&self) -> u16;
    /// Total sample-frames in the stream.
    fn nframes(&self) -> u64;
    /// Short tag describing the source encoding.
    fn encoding(&self) -> &'static str;
    /// Absolute sample-frame index of the read cursor.
    fn tell(&self) -> u64;
    /// Read exactly `nframes` sample-frames, converted to `T`.
    fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>>;
    /// Reposition the read cursor at an exact sample-frame.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;
    /// Release the underlying decoder. Idempotent.
    fn close(&mut self);
}

impl SoundRead for Mp3Reader {
    fn samplerate(&self) -> u32 {
        Mp3Reader::samplerate(self)
    }
    fn channels(&self) -> u16 {
        Mp3Reader::channels(self)
    }
    fn nframes(&self) -> u64 {
        Mp3Reader::nframes(self)
    }
    fn encoding(&self) -> &'static str {
        Mp3Reader::encoding(self)
    }
    fn tell(&self) -> u64 {
        Mp3Reader::tell(self)
    }
    fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>> {
        Mp3Reader::read_frames(self, nframes)
    }
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Mp3Reader::seek(self, pos)
    }
    fn close(&mut self) {
        Mp3Reader::close(self)
    }
}

impl SoundRead for GenericReader {
    fn samplerate(&self) -> u32 {
        GenericReader::samplerate(self)
    }
    fn channels(&self) -> u16 {
        GenericReader::channels(self)
    }
    fn nframes(&self) -> u64 {
        GenericReader::nframes(self)
    }
    fn encoding(&self) -> &'static str {
        GenericReader::encoding(self)
    }
    fn tell(&self) -> u64 {
        GenericReader::tell(self)
    }
    fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>> {
        GenericReader::read_frames(self, nframes)
    }
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        GenericReader::seek(self, pos)
    }
    fn close(&mut self) {
        GenericReader::close(self)
    }
}

/// A sound file opened by [`SoundFile::open`], backed by whichever
/// reader recognized the format.
pub enum SoundFile {
    Mp3(Mp3Reader),
    Generic(GenericReader),
}

impl std::fmt::Debug for SoundFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoundFile::Mp3(_) => f.debug_tuple("Mp3").finish(),
            SoundFile::Generic(_) => f.debug_tuple("Generic").finish(),
        }
    }
}

impl SoundFile {
    /// Open `path` with the MP3 reader when it validates as an MPEG
    /// stream, otherwise with the generic reader. Only an MP3 format
    /// mismatch triggers the fallback; every other failure propagates.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SoundFile> {
        let path = path.as_ref();
        match Mp3Reader::open(path) {
            Ok(reader) => Ok(SoundFile::Mp3(reader)),
            Err(Error::Format(reason)) => {
                debug!(
                    path = %path.display(),
                    reason = %reason,
                    "not an MPEG stream, trying generic reader"
                );
                Ok(SoundFile::Generic(GenericReader::open(path)?))
            }
            Err(e) => Err(e),
        }
    }

    /// Open with an explicit file mode. Anything other than
    /// [`Mode::Read`] fails with [`Error::UnsupportedMode`].
    pub fn open_mode<P: AsRef<Path>>(path: P, mode: Mode) -> Result<SoundFile> {
        if mode != Mode::Read {
            return Err(Error::UnsupportedMode(mode));
        }
        Self::open(path)
    }
}

impl SoundRead for SoundFile {
    fn samplerate(&self) -> u32 {
        match self {
            SoundFile::Mp3(r) => r.samplerate(),
            SoundFile::Generic(r) => r.samplerate(),
        }
    }

    fn channels(&self) -> u16 {
        match self {
            SoundFile::Mp3(r) => r.channels(),
            SoundFile::Generic(r) => r.channels(),
        }
    }

    fn nframes(&self) -> u64 {
        match self {
            SoundFile::Mp3(r) => r.nframes(),
            SoundFile::Generic(r) => r.nframes(),
        }
    }

    fn encoding(&self) -> &'static str {
        match self {
            SoundFile::Mp3(r) => r.encoding(),
            SoundFile::Generic(r) => r.encoding(),
        }
    }

    fn tell(&self) -> u64 {
        match self {
            SoundFile::Mp3(r) => r.tell(),
            SoundFile::Generic(r) => r.tell(),
        }
    }

    fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>> {
        match self {
            SoundFile::Mp3(r) => r.read_frames(nframes),
            SoundFile::Generic(r) => r.read_frames(nframes),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match self {
            SoundFile::Mp3(r) => r.seek(pos),
            SoundFile::Generic(r) => r.seek(pos),
        }
    }

    fn close(&mut self) {
        match self {
            SoundFile::Mp3(r) => r.close(),
            SoundFile::Generic(r) => r.close(),
        }
    }
}

/// Read a block of frames from any recognized sound file.
///
/// Opens `path`, seeks to `first`, reads `last.unwrap_or(nframes) - first`
/// sample-frames and returns them with the sample rate and encoding tag.
/// The handle is released on every path when the reader drops. Errors
/// from open, seek, and read propagate unchanged.
pub fn read_file<S, P>(path: P, first: u64, last: Option<u64>) -> Result<(Vec<S>, u32, &'static str)>
where
    S: Sample,
    P: AsRef<Path>,
{
    let mut sound = SoundFile::open(path)?;
    let samplerate = sound.samplerate();
    let encoding = sound.encoding();

    sound.seek(SeekFrom::Start(first))?;
    let last = last.unwrap_or_else(|| sound.nframes());
    let count = last.checked_sub(first).ok_or_else(|| {
        Error::InvalidArgument(format!("last frame {last} precedes first frame {first}"))
    })?;
    let data = sound.read_frames::<S>(count as usize)?;
    Ok((data, samplerate, encoding))
}
