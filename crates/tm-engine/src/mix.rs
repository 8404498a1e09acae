//! Page mixing primitives.
//!
//! Sources are unsigned 8-bit samples biased at 0x80. Every operation uses
//! wrapping arithmetic, so un-mixing a span restores the page exactly even
//! when the sum overflowed.

/// Add `src` onto an unsigned 8-bit page, re-centering on the bias.
pub fn mix_mono8(dst: &mut [u8], src: &[u8]) {
    for (out, &s) in dst.iter_mut().zip(src) {
        *out = out.wrapping_add(s).wrapping_sub(0x80);
    }
}

/// Undo [`mix_mono8`].
pub fn unmix_mono8(dst: &mut [u8], src: &[u8]) {
    for (out, &s) in dst.iter_mut().zip(src) {
        *out = out.wrapping_sub(s).wrapping_add(0x80);
    }
}

#[inline]
fn widen(sample: u8, shift: u32) -> i16 {
    (i16::from(sample) - 0x80).wrapping_shl(shift)
}

/// Add `src` onto a signed 16-bit little-endian page, scaled by `shift`.
///
/// `dst` holds two bytes per sample of `src`.
pub fn mix_mono16(dst: &mut [u8], src: &[u8], shift: u32) {
    for (out, &s) in dst.chunks_exact_mut(2).zip(src) {
        let acc = i16::from_le_bytes([out[0], out[1]]).wrapping_add(widen(s, shift));
        out.copy_from_slice(&acc.to_le_bytes());
    }
}

/// Undo [`mix_mono16`].
pub fn unmix_mono16(dst: &mut [u8], src: &[u8], shift: u32) {
    for (out, &s) in dst.chunks_exact_mut(2).zip(src) {
        let acc = i16::from_le_bytes([out[0], out[1]]).wrapping_sub(widen(s, shift));
        out.copy_from_slice(&acc.to_le_bytes());
    }
}
