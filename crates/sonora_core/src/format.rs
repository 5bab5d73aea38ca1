//! Sample Formats and Typed Samples

use std::fmt;
use std::ops::BitOr;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Sample format bit set understood by the native engine.
///
/// Exactly one base format is expected; [`SampleFormat::NON_INTERLEAVED`] may
/// be or-ed on top to request one buffer per channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleFormat(u32);

impl SampleFormat {
    pub const FLOAT32: Self = Self(0x0000_0001);
    pub const INT32: Self = Self(0x0000_0002);
    pub const INT24: Self = Self(0x0000_0004);
    pub const INT16: Self = Self(0x0000_0008);
    pub const INT8: Self = Self(0x0000_0010);
    pub const UINT8: Self = Self(0x0000_0020);
    pub const CUSTOM: Self = Self(0x0001_0000);
    pub const NON_INTERLEAVED: Self = Self(0x8000_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True unless the non-interleaved marker bit is set
    pub const fn is_interleaved(self) -> bool {
        self.0 & Self::NON_INTERLEAVED.0 == 0
    }

    /// Same format with the non-interleaved marker set
    pub const fn non_interleaved(self) -> Self {
        Self(self.0 | Self::NON_INTERLEAVED.0)
    }

    /// Format with the non-interleaved marker stripped
    pub const fn base(self) -> Self {
        Self(self.0 & !Self::NON_INTERLEAVED.0)
    }

    /// Size in bytes of a single sample, `None` for custom or unknown formats
    pub fn sample_size(self) -> Option<usize> {
        match self.base() {
            Self::FLOAT32 | Self::INT32 => Some(4),
            Self::INT24 => Some(3),
            Self::INT16 => Some(2),
            Self::INT8 | Self::UINT8 => Some(1),
            _ => None,
        }
    }

    /// Byte value that represents silence in this format
    pub fn silence_byte(self) -> u8 {
        if self.base() == Self::UINT8 {
            0x80
        } else {
            0
        }
    }
}

impl BitOr for SampleFormat {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self::FLOAT32
    }
}

impl fmt::Debug for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.base() {
            Self::FLOAT32 => "Float32",
            Self::INT32 => "Int32",
            Self::INT24 => "Int24",
            Self::INT16 => "Int16",
            Self::INT8 => "Int8",
            Self::UINT8 => "UInt8",
            Self::CUSTOM => "Custom",
            _ => return write!(f, "SampleFormat({:#x})", self.0),
        };
        if self.is_interleaved() {
            f.write_str(name)
        } else {
            write!(f, "{name}|NonInterleaved")
        }
    }
}

/// A sample type that can be written to the engine without conversion.
///
/// `CHANNELS` is the number of interleaved samples one value packs, so a
/// [`Stereo`] frame counts as two.
pub trait Sample: Pod {
    const FORMAT: SampleFormat;
    const CHANNELS: u16 = 1;
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::FLOAT32;
}

impl Sample for i32 {
    const FORMAT: SampleFormat = SampleFormat::INT32;
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::INT16;
}

impl Sample for i8 {
    const FORMAT: SampleFormat = SampleFormat::INT8;
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::UINT8;
}

/// One interleaved left/right frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Stereo<T> {
    pub left: T,
    pub right: T,
}

impl<T> Stereo<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }
}

// SAFETY: two fields of the same Pod type under repr(C) leave no padding.
unsafe impl<T: Pod> Zeroable for Stereo<T> {}
unsafe impl<T: Pod> Pod for Stereo<T> {}

impl<T: Sample> Sample for Stereo<T> {
    const FORMAT: SampleFormat = T::FORMAT;
    const CHANNELS: u16 = 2 * T::CHANNELS;
}

impl<T: fmt::Display> fmt::Display for Stereo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Left:{} Right:{}", self.left, self.right)
    }
}
