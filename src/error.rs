//! Error types for mp3sndfile
//!
//! Defines the crate-wide error type using thiserror for clear error
//! propagation. Every failure is reported synchronously to the caller of
//! the operation that detected it; nothing is retried or downgraded here.
//! Fallback-on-failure behavior lives in the format dispatcher, not in the
//! readers themselves.

use thiserror::Error;

use crate::dispatch::Mode;

/// Main error type for sound-file reading.
#[derive(Error, Debug)]
pub enum Error {
    /// Input does not parse as an MPEG audio stream. Raised at open time,
    /// never midstream.
    #[error("format error: {0}")]
    Format(String),

    /// A caller-supplied argument is outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted after `close()`.
    #[error("reader is closed")]
    Closed,

    /// Seek target outside the valid frame range.
    #[error("seek target {target} outside [0, {nframes}]")]
    SeekOutOfRange { target: i64, nframes: u64 },

    /// A file mode other than read was requested.
    #[error("unsupported mode {0:?}: readers in this crate are read-only")]
    UnsupportedMode(Mode),

    /// Operation not available on a read-only reader.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The decoder ran out of stream before satisfying a read. Counts are
    /// in sample-frames.
    #[error("underrun: requested {requested} frames, only {available} available")]
    Underrun { requested: u64, available: u64 },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bitstream decoder failure.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenience Result type using the crate Error.
pub type Result<T> = std::result::Result<T, Error>;
