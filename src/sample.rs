//! Output sample types for `read_frames`.
//!
//! The MP3 decoder's native precision is 16-bit signed PCM, so every read
//! starts life as i16. Integer targets are plain widening or narrowing
//! casts of the native value. Floating-point targets are normalized by
//! 2^15 following the libsndfile int-to-float conversion rule, mapping the
//! native range [-32768, 32767] onto [-1.0, 1.0).

/// A numeric type decoded PCM can be converted into.
pub trait Sample: Copy + PartialEq + std::fmt::Debug + 'static {
    /// Convert one native 16-bit PCM value into this type.
    fn from_i16(value: i16) -> Self;
}

impl Sample for i16 {
    #[inline]
    fn from_i16(value: i16) -> Self {
        value
    }
}

impl Sample for i8 {
    #[inline]
    fn from_i16(value: i16) -> Self {
        value as i8
    }
}

impl Sample for i32 {
    #[inline]
    fn from_i16(value: i16) -> Self {
        i32::from(value)
    }
}

impl Sample for f32 {
    #[inline]
    fn from_i16(value: i16) -> Self {
        f32::from(value) / 32768.0
    }
}

impl Sample for f64 {
    #[inline]
    fn from_i16(value: i16) -> Self {
        f64::from(value) / 32768.0
    }
}
