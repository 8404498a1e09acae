//! Output sample formats.

use serde::{Deserialize, Serialize};

/// Sample format of the mix buffer.
///
/// Source data is always unsigned 8-bit with a 0x80 bias.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixFormat {
    /// Unsigned 8-bit mono, silence at 0x80.
    #[default]
    Mono8,
    /// Signed 16-bit little-endian mono, silence at 0.
    Mono16,
}

impl MixFormat {
    /// Bytes per mixed sample.
    pub const fn sample_bytes(self) -> usize {
        match self {
            MixFormat::Mono8 => 1,
            MixFormat::Mono16 => 2,
        }
    }

    /// Byte value that fills a silent page.
    pub const fn silence(self) -> u8 {
        match self {
            MixFormat::Mono8 => 0x80,
            MixFormat::Mono16 => 0x00,
        }
    }

    /// Bits per sample.
    pub const fn bits(self) -> u16 {
        match self {
            MixFormat::Mono8 => 8,
            MixFormat::Mono16 => 16,
        }
    }
}

/// Left shift applied to 8-bit sources in 16-bit mixing.
///
/// Full scale for one voice, one bit of headroom less per doubling of the
/// voice count, so the summed page cannot overflow.
pub(crate) fn attenuation_shift(voices: usize) -> u32 {
    match voices {
        0 | 1 => 8,
        n => 8u32.saturating_sub(usize::BITS - (n - 1).leading_zeros()),
    }
}
