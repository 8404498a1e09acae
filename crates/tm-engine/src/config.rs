//! Mixer configuration.

use serde::{Deserialize, Serialize};

use crate::format::MixFormat;
use crate::MixError;

/// Largest number of pages in the mix buffer.
pub const MAX_PAGES: usize = 8;

/// Largest number of voice slots.
pub const VOICE_SLOTS: usize = 32;

/// Mixing engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Requested playback rate in Hz. The device may quantize it.
    pub sample_rate: u32,
    /// Maximum number of concurrently playing voices.
    pub voices: usize,
    /// Requested output format.
    pub format: MixFormat,
    /// Number of pages in the mix buffer.
    pub pages: usize,
    /// Size of one page in bytes.
    pub page_bytes: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 11025,
            voices: 4,
            format: MixFormat::Mono8,
            pages: 4,
            page_bytes: 128,
        }
    }
}

impl MixerConfig {
    pub fn validate(&self) -> Result<(), MixError> {
        if !(2..=MAX_PAGES).contains(&self.pages) {
            return Err(MixError::InvalidConfig("pages must be between 2 and 8"));
        }
        if !(1..=VOICE_SLOTS).contains(&self.voices) {
            return Err(MixError::InvalidConfig("voices must be between 1 and 32"));
        }
        if self.page_bytes == 0 || self.page_bytes % MixFormat::Mono16.sample_bytes() != 0 {
            return Err(MixError::InvalidConfig("page size must be a non-zero even byte count"));
        }
        if self.sample_rate == 0 {
            return Err(MixError::InvalidConfig("sample rate must be non-zero"));
        }
        Ok(())
    }

    /// Total mix buffer size in bytes.
    pub fn buffer_bytes(&self) -> usize {
        self.page_bytes * self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = MixerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_bytes(), 512);
    }

    #[test]
    fn rejects_out_of_range() {
        let bad = [
            MixerConfig { pages: 1, ..Default::default() },
            MixerConfig { pages: MAX_PAGES + 1, ..Default::default() },
            MixerConfig { voices: 0, ..Default::default() },
            MixerConfig { voices: VOICE_SLOTS + 1, ..Default::default() },
            MixerConfig { page_bytes: 0, ..Default::default() },
            MixerConfig { page_bytes: 127, ..Default::default() },
            MixerConfig { sample_rate: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(MixError::InvalidConfig(_))), "{config:?}");
        }
    }
}
