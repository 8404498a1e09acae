//! WAV encoding for mono 8-bit and 16-bit PCM.

use std::io::Write;
use tm_engine::MixFormat;

/// Write `pcm`, already laid out in `format`, as a mono WAV file.
pub fn write_wav(w: &mut impl Write, pcm: &[u8], format: MixFormat, sample_rate: u32) -> std::io::Result<()> {
    let num_channels: u16 = 1;
    let bits_per_sample = format.bits();
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = pcm.len() as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align, bits_per_sample)?;
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    w.write_all(pcm)
}

pub fn pcm_to_wav(pcm: &[u8], format: MixFormat, sample_rate: u32) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(pcm.len() + 44);
    write_wav(&mut buf, pcm, format, sample_rate)?;
    Ok(buf)
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(b: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([b[at], b[at + 1]])
    }

    fn u32_at(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    #[test]
    fn eight_bit_header() {
        let wav = pcm_to_wav(&[0x80; 10], MixFormat::Mono8, 11025).unwrap();
        assert_eq!(wav.len(), 54);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 46);
        assert_eq!(u16_at(&wav, 22), 1);
        assert_eq!(u32_at(&wav, 24), 11025);
        assert_eq!(u32_at(&wav, 28), 11025);
        assert_eq!(u16_at(&wav, 32), 1);
        assert_eq!(u16_at(&wav, 34), 8);
        assert_eq!(u32_at(&wav, 40), 10);
    }

    #[test]
    fn sixteen_bit_byte_rate() {
        let wav = pcm_to_wav(&[0; 8], MixFormat::Mono16, 8000).unwrap();
        assert_eq!(u32_at(&wav, 28), 16000);
        assert_eq!(u16_at(&wav, 32), 2);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[44..], &[0; 8]);
    }
}
