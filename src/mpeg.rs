//! MPEG audio frame-header parsing and stream scanning
//!
//! Confirms at open time that the input is a well-formed MPEG audio
//! stream before the frame decoder is constructed, and derives stream
//! metadata the decoder itself does not report: sample rate, channel
//! mode, and the exact total sample-frame count (gathered by walking
//! every frame header in the file).

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How far past the ID3 tag to look for the first frame sync.
const SYNC_WINDOW: usize = 64 * 1024;

/// MPEG version id from the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// Channel mode from the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    SingleChannel,
}

impl ChannelMode {
    /// Fixed mapping from header mode to the reader's channel count.
    pub fn channel_count(self) -> u16 {
        match self {
            ChannelMode::SingleChannel => 1,
            ChannelMode::Stereo | ChannelMode::JointStereo | ChannelMode::DualChannel => 2,
        }
    }
}

/// One parsed Layer III frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub version: Version,
    /// Bits per second.
    pub bitrate: u32,
    /// Hz.
    pub sample_rate: u32,
    pub padding: bool,
    pub mode: ChannelMode,
}

const BITRATES_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L3: [u32; 15] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
];
/// MPEG-1 row; MPEG-2 halves these, MPEG-2.5 quarters them.
const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

impl FrameHeader {
    /// Parse a 4-byte Layer III frame header.
    ///
    /// Returns `None` when the bytes do not form a decodable header: bad
    /// sync, reserved version or sample-rate field, a layer other than
    /// III, or a free-format bitrate (whose frame length cannot be
    /// computed from the header alone).
    pub fn parse(bytes: [u8; 4]) -> Option<FrameHeader> {
        if bytes[0] != 0xFF || bytes[1] & 0b1110_0000 != 0b1110_0000 {
            return None;
        }

        let version = match bytes[1] & 0b0001_1000 {
            0b0001_1000 => Version::Mpeg1,
            0b0001_0000 => Version::Mpeg2,
            0b0000_0000 => Version::Mpeg25,
            _ => return None,
        };

        // Layer III only; the frame decoder handles nothing else.
        if bytes[1] & 0b0000_0110 != 0b0000_0010 {
            return None;
        }

        let bitrate_index = (bytes[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let kbps = match version {
            Version::Mpeg1 => BITRATES_V1_L3[bitrate_index],
            Version::Mpeg2 | Version::Mpeg25 => BITRATES_V2_L3[bitrate_index],
        };

        let rate_index = ((bytes[2] >> 2) & 0b11) as usize;
        if rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            Version::Mpeg1 => SAMPLE_RATES[rate_index],
            Version::Mpeg2 => SAMPLE_RATES[rate_index] / 2,
            Version::Mpeg25 => SAMPLE_RATES[rate_index] / 4,
        };

        let padding = bytes[2] & 0b10 != 0;

        let mode = match bytes[3] >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        };

        Some(FrameHeader {
            version,
            bitrate: kbps * 1000,
            sample_rate,
            padding,
            mode,
        })
    }

    /// Samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> u32 {
        match self.version {
            Version::Mpeg1 => 1152,
            Version::Mpeg2 | Version::Mpeg25 => 576,
        }
    }

    /// Whole frame length in bytes, header included.
    pub fn frame_len(&self) -> u64 {
        let slots = self.samples_per_frame() / 8;
        u64::from(slots * self.bitrate / self.sample_rate + u32::from(self.padding))
    }
}

/// Metadata gathered by walking every frame header in the stream.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Hz, taken from the first frame.
    pub sample_rate: u32,
    /// Channel mode of the first frame.
    pub mode: ChannelMode,
    /// Exact total sample-frames per channel.
    pub total_frames: u64,
    /// Number of decoder frames in the stream.
    pub frame_count: u64,
}

impl StreamInfo {
    /// Stream duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.total_frames * 1000 / u64::from(self.sample_rate)
    }
}

/// Validate `path` as an MPEG audio stream and collect its metadata.
///
/// Skips a leading ID3v2 tag, locates the first frame sync within a
/// bounded window, then walks frame to frame accumulating the exact
/// sample-frame total. Fails with `Error::Format` when the input never
/// syncs.
pub fn scan<P: AsRef<Path>>(path: P) -> Result<StreamInfo> {
    let file = File::open(path.as_ref())?;
    scan_reader(BufReader::new(file))
}

pub(crate) fn scan_reader<R: Read + Seek>(mut reader: R) -> Result<StreamInfo> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let data_start = skip_id3v2(&mut reader)?;

    let (first_pos, first) = find_first_frame(&mut reader, data_start, file_len)?;
    if first_pos != data_start {
        debug!(
            skipped = first_pos - data_start,
            "leading bytes before first frame sync"
        );
    }

    let mut total_frames: u64 = 0;
    let mut frame_count: u64 = 0;
    let mut pos = first_pos;
    let mut header = first;
    loop {
        total_frames += u64::from(header.samples_per_frame());
        frame_count += 1;
        pos += header.frame_len();
        match read_header_at(&mut reader, pos)? {
            Some(next) => {
                if next.sample_rate != first.sample_rate {
                    // A sane stream never changes rate; stop counting here
                    // rather than guess at the remainder.
                    warn!(
                        at = pos,
                        rate = next.sample_rate,
                        "sample rate change mid-stream, truncating scan"
                    );
                    break;
                }
                header = next;
            }
            None => break,
        }
    }

    let info = StreamInfo {
        sample_rate: first.sample_rate,
        mode: first.mode,
        total_frames,
        frame_count,
    };
    debug!(
        sample_rate = info.sample_rate,
        frames = info.frame_count,
        total = info.total_frames,
        ?info.mode,
        "scanned MPEG stream"
    );
    Ok(info)
}

/// Skip a leading ID3v2 tag, returning the offset of the audio data.
fn skip_id3v2<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    reader.seek(SeekFrom::Start(0))?;
    let mut tag = [0u8; 10];
    match reader.read_exact(&mut tag) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(0),
        Err(e) => return Err(e.into()),
    }
    if &tag[0..3] != b"ID3" {
        return Ok(0);
    }
    // Syncsafe 28-bit size; the footer flag adds another 10 bytes.
    let size = (u64::from(tag[6] & 0x7F) << 21)
        | (u64::from(tag[7] & 0x7F) << 14)
        | (u64::from(tag[8] & 0x7F) << 7)
        | u64::from(tag[9] & 0x7F);
    let footer = tag[5] & 0x10 != 0;
    Ok(10 + size + if footer { 10 } else { 0 })
}

/// Locate the first frame header at or after `start`.
///
/// A candidate only counts when the header at its predicted successor
/// offset also parses with the same version and sample rate, or the
/// stream ends with the candidate frame. That kills nearly all false
/// syncs in non-MPEG input.
fn find_first_frame<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    file_len: u64,
) -> Result<(u64, FrameHeader)> {
    reader.seek(SeekFrom::Start(start))?;
    let mut window = Vec::with_capacity(SYNC_WINDOW.min(8192));
    reader
        .by_ref()
        .take(SYNC_WINDOW as u64)
        .read_to_end(&mut window)?;

    let mut i = 0usize;
    while i + 4 <= window.len() {
        if let Some(candidate) =
            FrameHeader::parse([window[i], window[i + 1], window[i + 2], window[i + 3]])
        {
            let pos = start + i as u64;
            let next_pos = pos + candidate.frame_len();
            let verified = if next_pos + 4 > file_len {
                pos + candidate.frame_len() <= file_len
            } else {
                matches!(
                    read_header_at(reader, next_pos)?,
                    Some(next) if next.version == candidate.version
                        && next.sample_rate == candidate.sample_rate
                )
            };
            if verified {
                return Ok((pos, candidate));
            }
        }
        i += 1;
    }
    Err(Error::Format(
        "no MPEG audio frame sync found".to_string(),
    ))
}

/// Read and parse a frame header at an absolute offset. `None` means the
/// stream ends there or the bytes are not a header.
fn read_header_at<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<Option<FrameHeader>> {
    reader.seek(SeekFrom::Start(pos))?;
    let mut bytes = [0u8; 4];
    match reader.read_exact(&mut bytes) {
        Ok(()) => Ok(FrameHeader::parse(bytes)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}
