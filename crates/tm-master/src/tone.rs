//! Click synthesis for the metronome.

use std::sync::Arc;

/// Peak deviation from the 0x80 bias.
const AMPLITUDE: f32 = 96.0;

/// A decaying sine blip as unsigned 8-bit samples biased at 0x80.
pub fn blip(sample_rate: u32, freq: f32, millis: u32) -> Arc<[u8]> {
    let len = (u64::from(sample_rate) * u64::from(millis) / 1000) as usize;
    let rate = sample_rate.max(1) as f32;
    // Decays to about 1% over the blip.
    let decay = 4.6 / len.max(1) as f32;
    (0..len)
        .map(|i| {
            let phase = 2.0 * core::f32::consts::PI * freq * i as f32 / rate;
            let env = libm::expf(-decay * i as f32);
            let value = 128.0 + AMPLITUDE * env * libm::sinf(phase);
            libm::roundf(value).clamp(0.0, 255.0) as u8
        })
        .collect::<Vec<_>>()
        .into()
}
