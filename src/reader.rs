//! Sample-accurate MP3 reader
//!
//! `Mp3Reader` presents a sound-file style interface over the
//! frame-quantized decoder: exact-count reads at arbitrary offsets,
//! seeks to exact sample-frame positions, and conversion from native
//! 16-bit PCM to the caller's sample type.
//!
//! Seeking never rewinds the decoder in place. The decoder is reopened
//! from the start of the file and fast-forwarded with discarded reads,
//! which makes every backward or far-forward seek an O(offset)
//! decode-and-discard operation. Slow, but always lands on the exact
//! sample-frame.

use std::io::SeekFrom;
use std::path::Path;

use tracing::debug;

use crate::buffer::SampleQueue;
use crate::decoder::{FrameSource, Mp3FrameSource};
use crate::dispatch::Mode;
use crate::error::{Error, Result};
use crate::mpeg;
use crate::sample::Sample;

/// Frames to decode per discarded read while fast-forwarding a seek.
/// A multiple of the 1152-sample decoder frame, so accumulation overhead
/// in the queue stays low.
const SEEK_CHUNK_FRAMES: usize = 11_520;

/// Tunable knobs for `Mp3Reader::open_with`.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Chunk size, in sample-frames, for the seek fast-forward loop.
    /// Must be nonzero.
    pub seek_chunk_frames: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            seek_chunk_frames: SEEK_CHUNK_FRAMES,
        }
    }
}

/// Reader state shared by every frame source implementation.
///
/// `cursor` is the absolute sample-frame index of the first frame held
/// in (or about to enter) the queue; it never exceeds any index the
/// caller can request next, and advances by the frame count of every
/// successful read.
pub(crate) struct ReaderCore<S: FrameSource> {
    /// `None` once closed; closing is terminal.
    source: Option<S>,
    queue: SampleQueue,
    cursor: u64,
    samplerate: u32,
    channels: u16,
    nframes: u64,
    seek_chunk_frames: usize,
}

impl<S: FrameSource> ReaderCore<S> {
    /// Interleaved slots per sample-frame in the queue. Mono streams
    /// arrive from the adapter with the channel duplicated, so they
    /// occupy two slots just like stereo.
    fn slots(&self) -> usize {
        if self.channels == 1 {
            2
        } else {
            usize::from(self.channels)
        }
    }

    fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>> {
        if self.source.is_none() {
            return Err(Error::Closed);
        }
        let slots = self.slots();
        let nsamples = nframes.checked_mul(slots).ok_or_else(|| {
            Error::InvalidArgument(format!("frame count {nframes} overflows the sample count"))
        })?;

        let source = self.source.as_mut().ok_or(Error::Closed)?;
        while self.queue.len() < nsamples {
            match source.next_block()? {
                Some(block) => self.queue.push_block(&block),
                None => {
                    // The caller asked to read past the end of the
                    // stream. Already-buffered frames stay buffered.
                    return Err(Error::Underrun {
                        requested: nframes as u64,
                        available: (self.queue.len() / slots) as u64,
                    });
                }
            }
        }

        let out: Vec<T> = if self.channels == 1 {
            // Keep one of the two duplicated slots per frame.
            self.queue
                .pop_front(nsamples)
                .step_by(2)
                .map(T::from_i16)
                .collect()
        } else {
            self.queue.pop_front(nsamples).map(T::from_i16).collect()
        };
        self.cursor += nframes as u64;
        Ok(out)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.source.is_none() {
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
        let target = target as u64;

        // Restart the decoder and fast-forward with discarded reads.
        let source = self.source.as_mut().ok_or(Error::Closed)?;
        source.rewind()?;
        self.queue.clear();
        self.cursor = 0;

        let mut remaining = target;
        while remaining > 0 {
            let step = remaining.min(self.seek_chunk_frames as u64) as usize;
            self.read_frames::<i16>(step)?;
            remaining -= step as u64;
        }
        debug!(frame = target, "seek complete");
        Ok(target)
    }

    fn close(&mut self) {
        self.source = None;
        self.queue.clear();
    }
}

/// Sound-file style reader for MP3 streams.
///
/// Opening validates the MPEG frame-header sequence before the decoder
/// is constructed, so a file that is not an MPEG audio stream fails
/// cleanly with [`Error::Format`] and never yields a partially usable
/// reader.
///
/// # Example
///
/// ```no_run
/// use mp3sndfile::Mp3Reader;
///
/// let mut reader = Mp3Reader::open("track.mp3")?;
/// println!(
///     "{} Hz, {} ch, {} frames",
///     reader.samplerate(),
///     reader.channels(),
///     reader.nframes()
/// );
/// let block: Vec<f32> = reader.read_frames(1024)?;
/// assert_eq!(block.len(), 1024 * reader.channels() as usize);
/// # Ok::<(), mp3sndfile::Error>(())
/// ```
pub struct Mp3Reader {
    core: ReaderCore<Mp3FrameSource>,
}

impl std::fmt::Debug for Mp3Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp3Reader")
            .field("samplerate", &self.core.samplerate)
            .field("channels", &self.core.channels)
            .field("nframes", &self.core.nframes)
            .field("cursor", &self.core.cursor)
            .finish()
    }
}

impl Mp3Reader {
    /// Open an MP3 file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default())
    }

    /// Open with an explicit file mode. Anything other than [`Mode::Read`]
    /// fails with [`Error::UnsupportedMode`].
    pub fn open_mode<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        if mode != Mode::Read {
            return Err(Error::UnsupportedMode(mode));
        }
        Self::open(path)
    }

    /// Open with explicit options.
    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        if options.seek_chunk_frames == 0 {
            return Err(Error::InvalidArgument(
                "seek_chunk_frames must be nonzero".to_string(),
            ));
        }
        let path = path.as_ref();

        // Confirm a well-formed header sequence before constructing the
        // decoder; this is also where all stream metadata comes from.
        let info = mpeg::scan(path)?;
        let channels = info.mode.channel_count();
        debug!(
            path = %path.display(),
            samplerate = info.sample_rate,
            channels,
            nframes = info.total_frames,
            "opened MP3 stream"
        );

        let source = Mp3FrameSource::open(path, channels == 1)?;
        Ok(Self {
            core: ReaderCore {
                source: Some(source),
                queue: SampleQueue::new(),
                cursor: 0,
                samplerate: info.sample_rate,
                channels,
                nframes: info.total_frames,
                seek_chunk_frames: options.seek_chunk_frames,
            },
        })
    }

    /// Sample rate in Hz.
    pub fn samplerate(&self) -> u32 {
        self.core.samplerate
    }

    /// Number of channels (1 or 2).
    pub fn channels(&self) -> u16 {
        self.core.channels
    }

    /// Total sample-frames in the stream.
    pub fn nframes(&self) -> u64 {
        self.core.nframes
    }

    /// Encoding tag, always `"mp3"`.
    pub fn encoding(&self) -> &'static str {
        "mp3"
    }

    /// Absolute sample-frame index of the read cursor.
    pub fn tell(&self) -> u64 {
        self.core.cursor
    }

    /// Read exactly `nframes` sample-frames, converted to `T`.
    ///
    /// Returns `nframes` values for mono streams and
    /// `nframes * channels` interleaved values (frame-major) otherwise.
    /// Reading past the end of the stream fails with
    /// [`Error::Underrun`]; partial results are never returned.
    pub fn read_frames<T: Sample>(&mut self, nframes: usize) -> Result<Vec<T>> {
        self.core.read_frames(nframes)
    }

    /// Reposition the read cursor at an exact sample-frame.
    ///
    /// Warning: this is slow. The decoder cannot jump to arbitrary
    /// sample offsets, so every seek reopens the stream and decodes
    /// forward from the first frame, discarding output until the target
    /// is reached. Returns the achieved absolute frame index.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.core.seek(pos)
    }

    /// Release the decoder. Idempotent; all subsequent reads and seeks
    /// fail with [`Error::Closed`].
    pub fn close(&mut self) {
        self.core.close();
    }

    /// Unsupported; this reader is read-only by construction.
    pub fn write_frames(&mut self, _frames: &[i16]) -> Result<usize> {
        Err(Error::Unsupported("write_frames"))
    }

    /// No-op; there is no write buffering to flush.
    pub fn sync(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: usize = 1152;

    /// Deterministic ramp so sample identity is checkable: the flat
    /// interleaved stream is 0, 1, 2, ... masked to stay positive.
    fn ramp(index: usize) -> i16 {
        (index & 0x7FFF) as i16
    }

    struct MockSource {
        blocks: Vec<Vec<i16>>,
        next: usize,
    }

    impl MockSource {
        /// `frame_count` decoder frames of interleaved stereo ramp.
        fn stereo(frame_count: usize) -> Self {
            let blocks = (0..frame_count)
                .map(|f| {
                    (0..FRAME * 2)
                        .map(|i| ramp(f * FRAME * 2 + i))
                        .collect::<Vec<i16>>()
                })
                .collect();
            Self { blocks, next: 0 }
        }

        /// Mono ramp presented as duplicated slot pairs, the same layout
        /// the decoder adapter produces for single-channel streams.
        fn mono(frame_count: usize) -> Self {
            let blocks = (0..frame_count)
                .map(|f| {
                    let mut block = Vec::with_capacity(FRAME * 2);
                    for i in 0..FRAME {
                        let v = ramp(f * FRAME + i);
                        block.push(v);
                        block.push(v);
                    }
                    block
                })
                .collect();
            Self { blocks, next: 0 }
        }
    }

    impl FrameSource for MockSource {
        fn next_block(&mut self) -> Result<Option<Vec<i16>>> {
            if self.next < self.blocks.len() {
                let block = self.blocks[self.next].clone();
                self.next += 1;
                Ok(Some(block))
            } else {
                Ok(None)
            }
        }

        fn rewind(&mut self) -> Result<()> {
            self.next = 0;
            Ok(())
        }
    }

    fn stereo_core(frame_count: usize) -> ReaderCore<MockSource> {
        ReaderCore {
            source: Some(MockSource::stereo(frame_count)),
            queue: SampleQueue::new(),
            cursor: 0,
            samplerate: 44100,
            channels: 2,
            nframes: (frame_count * FRAME) as u64,
            seek_chunk_frames: SEEK_CHUNK_FRAMES,
        }
    }

    fn mono_core(frame_count: usize) -> ReaderCore<MockSource> {
        ReaderCore {
            source: Some(MockSource::mono(frame_count)),
            queue: SampleQueue::new(),
            cursor: 0,
            samplerate: 44100,
            channels: 1,
            nframes: (frame_count * FRAME) as u64,
            seek_chunk_frames: SEEK_CHUNK_FRAMES,
        }
    }

    #[test]
    fn test_exact_count() {
        let mut core = stereo_core(8);
        for n in [0usize, 1, 10, 100, 1000, 4000] {
            let buf: Vec<i16> = core.read_frames(n).unwrap();
            assert_eq!(buf.len(), n * 2);
        }
    }

    #[test]
    fn test_reads_are_contiguous() {
        let mut core = stereo_core(4);
        let a: Vec<i16> = core.read_frames(100).unwrap();
        let b: Vec<i16> = core.read_frames(100).unwrap();
        for (i, &v) in a.iter().chain(b.iter()).enumerate() {
            assert_eq!(v, ramp(i));
        }
    }

    #[test]
    fn test_chunked_reads_match_single_read() {
        let mut chunked = stereo_core(8);
        let mut buf: Vec<i16> = chunked.read_frames(1).unwrap();
        for n in [250usize, 500, 1000, 2000, 4000] {
            buf.extend(chunked.read_frames::<i16>(n).unwrap());
        }

        let mut whole = stereo_core(8);
        let expected: Vec<i16> = whole.read_frames(7751).unwrap();
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_seek_start_then_read_is_idempotent() {
        for bufsize in [10usize, 500, 5000] {
            let mut core = stereo_core(8);
            let first: Vec<i16> = core.read_frames(bufsize).unwrap();
            assert_eq!(core.seek(SeekFrom::Start(0)).unwrap(), 0);
            let again: Vec<i16> = core.read_frames(bufsize).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_seek_current_rereads_second_half() {
        for bufsize in [10usize, 500, 5000] {
            let mut core = stereo_core(12);
            core.read_frames::<i16>(bufsize).unwrap();
            let second: Vec<i16> = core.read_frames(bufsize).unwrap();
            core.seek(SeekFrom::Current(-(bufsize as i64))).unwrap();
            let again: Vec<i16> = core.read_frames(bufsize).unwrap();
            assert_eq!(second, again);
        }
    }

    #[test]
    fn test_seek_end_reads_tail() {
        let mut core = stereo_core(6);
        let nframes = core.nframes as usize;
        let whole: Vec<i16> = core.read_frames(nframes).unwrap();

        let bufsize = 1000usize;
        let mut tail_core = stereo_core(6);
        tail_core.seek(SeekFrom::End(-(bufsize as i64))).unwrap();
        let tail: Vec<i16> = tail_core.read_frames(bufsize).unwrap();
        assert_eq!(tail, whole[(nframes - bufsize) * 2..]);
    }

    #[test]
    fn test_seek_returns_target_and_moves_cursor() {
        let mut core = stereo_core(4);
        assert_eq!(core.seek(SeekFrom::Start(1234)).unwrap(), 1234);
        assert_eq!(core.cursor, 1234);
        assert_eq!(core.seek(SeekFrom::Current(100)).unwrap(), 1334);
        assert_eq!(core.seek(SeekFrom::End(0)).unwrap(), core.nframes);
    }

    #[test]
    fn test_seek_out_of_range() {
        let mut core = stereo_core(4);
        let nframes = core.nframes;
        assert!(matches!(
            core.seek(SeekFrom::Start(nframes + 1)),
            Err(Error::SeekOutOfRange { target, .. }) if target == nframes as i64 + 1
        ));
        assert!(matches!(
            core.seek(SeekFrom::End(1)),
            Err(Error::SeekOutOfRange { .. })
        ));
        assert!(matches!(
            core.seek(SeekFrom::Current(-1)),
            Err(Error::SeekOutOfRange { target: -1, .. })
        ));
        // A failed seek must not move the cursor.
        assert_eq!(core.cursor, 0);
    }

    #[test]
    fn test_small_seek_chunk_is_still_exact() {
        let mut core = stereo_core(8);
        core.seek_chunk_frames = 100;
        core.seek(SeekFrom::Start(2500)).unwrap();
        let buf: Vec<i16> = core.read_frames(10).unwrap();
        for (i, &v) in buf.iter().enumerate() {
            assert_eq!(v, ramp(2500 * 2 + i));
        }
    }

    #[test]
    fn test_underrun_reports_counts() {
        let mut core = stereo_core(4);
        core.read_frames::<i16>(4000).unwrap();
        // 608 frames remain in the stream; 1000 cannot be satisfied.
        let err = core.read_frames::<i16>(1000).unwrap_err();
        assert!(matches!(
            err,
            Error::Underrun {
                requested: 1000,
                available: 608,
            }
        ));
        // The buffered tail survives the failed read.
        let tail: Vec<i16> = core.read_frames(608).unwrap();
        assert_eq!(tail.len(), 608 * 2);
        assert_eq!(tail[0], ramp(4000 * 2));
    }

    #[test]
    fn test_mono_deduplicates_slots() {
        let mut core = mono_core(4);
        let buf: Vec<i16> = core.read_frames(2000).unwrap();
        assert_eq!(buf.len(), 2000);
        for (i, &v) in buf.iter().enumerate() {
            assert_eq!(v, ramp(i));
        }
        let more: Vec<i16> = core.read_frames(100).unwrap();
        assert_eq!(more[0], ramp(2000));
    }

    #[test]
    fn test_float_reads_match_native() {
        let mut native = stereo_core(2);
        let ints: Vec<i16> = native.read_frames(500).unwrap();
        let mut float = stereo_core(2);
        let floats: Vec<f32> = float.read_frames(500).unwrap();
        for (&i, &f) in ints.iter().zip(&floats) {
            assert_eq!(f, i as f32 / 32768.0);
            assert!((-1.0..1.0).contains(&f));
        }
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut core = stereo_core(2);
        core.close();
        assert!(matches!(core.read_frames::<i16>(1), Err(Error::Closed)));
        assert!(matches!(core.seek(SeekFrom::Start(0)), Err(Error::Closed)));
        // Idempotent.
        core.close();
        assert!(matches!(core.read_frames::<i16>(0), Err(Error::Closed)));
    }
}
