//! Generic sound-file fallback reader
//!
//! symphonia-backed reader for the non-MP3 formats the dispatcher can
//! fall back to (WAV, FLAC, Vorbis). The whole stream is decoded to
//! native 16-bit PCM at open time; reads and seeks then slice the
//! in-memory buffer, so the capability set matches the MP3 reader while
//! seeking stays O(1).

use std::fs::File;
use std::io::SeekFrom;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    DecoderOptions, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::dispatch::Mode;
use crate::error::{Error, Result};
use crate::sample::Sample;

/// Sound-file reader for formats other than MP3.
pub struct GenericReader {
    /// Interleaved native PCM for the whole stream. Emptied on close.
    samples: Vec<i16>,
    closed: bool,
    /// Absolute sample-frame index of the read cursor.
    cursor: u64,
    samplerate: u32,
    channels: u16,
    nframes: u64,
    encoding: &'static str,
}

impl GenericReader {
    /// Open and fully decode a sound file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Format(format!("unrecognized sound file: {e}")))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Format("no audio track found".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let samplerate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Format("sample rate not reported".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::Format("channel count not reported".to_string()))?;
        if channels == 0 || channels > 2 {
            return Err(Error::Format(format!(
                "unsupported channel count: {channels}"
            )));
        }
        let encoding = encoding_tag(codec_params.codec);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("failed to create decoder: {e}")))?;

        let mut samples: Vec<i16> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("error reading packet: {e}");
                    break;
                }
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(e) => {
                    warn!("decode error: {e}");
                    continue;
                }
            }
        }

        let channels = channels as u16;
        let nframes = (samples.len() / usize::from(channels)) as u64;
        debug!(
            path = %path.display(),
            samplerate,
            channels,
            nframes,
            encoding,
            "opened sound file"
        );

        Ok(Self {
            samples,
            closed: false,
            cursor: 0,
            samplerate,
            channels,
            nframes,
            encoding,
        })
    }

    /// Open with an explicit file mode. Anything other than [`Mode::Read`]
    /// fails with [`Error::UnsupportedMode`].
    pub fn open_mode<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        if mode != Mode::Read {
            return Err(Error::UnsupportedMode(mode));
        }
        Self::open(path)
    }

    /// Sample rate in Hz.
    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    /// Number of channels (1 or 2).
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total sample-frames in the stream.
    pub fn nframes(&self) -> u64 {
        self.nframes
    }

    /// Encoding tag derived from the source codec.
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    /// Absolute sample-frame index of the read cursor.
    pub fn tell(&self) -> u64 {
        self.cursor
    }

    /// Read exactly `nframes` sample-frames, converted to `T`.
    pub fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>> {
        if self.closed {
            return Err(Error::Closed);
        }
        let available = self.nframes - self.cursor;
        if nframes as u64 > available {
            return Err(Error::Underrun {
                requested: nframes as u64,
                available,
            });
        }
        let stride = usize::from(self.channels);
        let start = self.cursor as usize * stride;
        let out = self.samples[start..start + nframes * stride]
            .iter()
            .map(|&s| T::from_i16(s))
            .collect();
        self.cursor += nframes as u64;
        Ok(out)
    }

    /// Reposition the read cursor at an exact sample-frame.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.closed {
            return Err(Error::Closed);
        }
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => i128::from(self.cursor) + i128::from(offset),
            SeekFrom::End(offset) => i128::from(self.nframes) + i128::from(offset),
        };
        if target < 0 || target > i128::from(self.nframes) {
            return Err(Error::SeekOutOfRange {
                target: target.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
                nframes: self.nframes,
            });
        }
        self.cursor = target as u64;
        Ok(self.cursor)
    }

    /// Release the decoded stream. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
        self.samples = Vec::new();
    }

    /// Unsupported; this reader is read-only by construction.
    pub fn write_frames(&mut self, _frames: &[i16]) -> Result<usize> {
        Err(Error::Unsupported("write_frames"))
    }

    /// No-op; there is no write buffering to flush.
    pub fn sync(&mut self) {}
}

fn encoding_tag(codec: symphonia::core::codecs::CodecType) -> &'static str {
    match codec {
        CODEC_TYPE_FLAC => "flac",
        CODEC_TYPE_VORBIS => "vorbis",
        CODEC_TYPE_MP3 => "mp3",
        _ => "pcm16",
    }
}
