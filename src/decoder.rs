//! Frame decoder adapter
//!
//! Wraps the minimp3 bitstream decoder behind the narrow `FrameSource`
//! seam the reader is written against: pull the next whole frame as an
//! interleaved i16 block, or report end of stream. The decoder can only
//! produce whole frames and only restart from the beginning of the
//! stream, which is exactly the shape this trait exposes.
//!
//! Mono frames are widened to two identical interleaved slots so every
//! supported stream presents the same dual-slot layout downstream;
//! collapsing back to one value per sample-frame is the reader's job.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use minimp3::{Decoder, Error as Mp3Error};
use tracing::debug;

use crate::error::{Error, Result};

/// A frame-quantized PCM producer.
///
/// The reader only ever pulls whole frames and rewinds to the stream
/// start; keeping the surface this small also keeps the reader logic
/// testable against synthetic sources.
pub(crate) trait FrameSource {
    /// Decode the next frame into an interleaved i16 block. Returns
    /// `None` at end of stream.
    fn next_block(&mut self) -> Result<Option<Vec<i16>>>;

    /// Reposition at the first frame, as if freshly opened.
    fn rewind(&mut self) -> Result<()>;
}

/// minimp3-backed `FrameSource` reading from a file on disk.
///
/// Keeps the source path so a rewind can reopen the file; the decoder
/// itself has no way to move backward.
pub(crate) struct Mp3FrameSource {
    decoder: Decoder<BufReader<File>>,
    path: PathBuf,
    mono: bool,
    frames_decoded: u64,
}

impl Mp3FrameSource {
    pub fn open(path: &Path, mono: bool) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            decoder: Decoder::new(BufReader::new(file)),
            path: path.to_path_buf(),
            mono,
            frames_decoded: 0,
        })
    }
}

impl FrameSource for Mp3FrameSource {
    fn next_block(&mut self) -> Result<Option<Vec<i16>>> {
        loop {
            match self.decoder.next_frame() {
                Ok(frame) => {
                    self.frames_decoded += 1;
                    let block = if self.mono && frame.channels == 1 {
                        let mut widened = Vec::with_capacity(frame.data.len() * 2);
                        for &sample in &frame.data {
                            widened.push(sample);
                            widened.push(sample);
                        }
                        widened
                    } else {
                        frame.data
                    };
                    return Ok(Some(block));
                }
                Err(Mp3Error::Eof) | Err(Mp3Error::InsufficientData) => {
                    debug!(frames = self.frames_decoded, "decoder reached end of stream");
                    return Ok(None);
                }
                // Tags or junk between frames; keep pulling.
                Err(Mp3Error::SkippedData) => continue,
                Err(Mp3Error::Io(e)) => return Err(Error::Io(e)),
            }
        }
    }

    fn rewind(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "reopening decoder from stream start");
        let file = File::open(&self.path)?;
        self.decoder = Decoder::new(BufReader::new(file));
        self.frames_decoded = 0;
        Ok(())
    }
}
