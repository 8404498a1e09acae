//! Settings loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tm_engine::MixerConfig;
use tm_timer::TimerConfig;

use crate::MasterError;

/// Parameters of the metronome demo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Starting tempo.
    pub bpm: u32,
    /// Tempo change applied at every bar line, in BPM.
    pub bpm_step: i32,
    pub beats_per_bar: u32,
    /// Pitch of the off-beat click.
    pub click_hz: f32,
    /// Pitch of the first beat of a bar.
    pub accent_hz: f32,
    /// Length of one click.
    pub click_ms: u32,
    /// Voice priority of off-beat clicks. Accents play one higher.
    pub priority: i32,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            bpm: 120,
            bpm_step: 0,
            beats_per_bar: 4,
            click_hz: 880.0,
            accent_hz: 1320.0,
            click_ms: 80,
            priority: 10,
        }
    }
}

/// Everything the controller needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timer: TimerConfig,
    pub mixer: MixerConfig,
    pub demo: DemoSettings,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, MasterError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, MasterError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, MasterError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_engine::MixFormat;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_tables_fill_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [mixer]
            voices = 8
            format = "Mono16"

            [demo]
            bpm = 90
            "#,
        )
        .unwrap();
        assert_eq!(settings.mixer.voices, 8);
        assert_eq!(settings.mixer.format, MixFormat::Mono16);
        assert_eq!(settings.mixer.pages, 4);
        assert_eq!(settings.demo.bpm, 90);
        assert_eq!(settings.demo.beats_per_bar, 4);
        assert_eq!(settings.timer.base_frequency, 1_193_180);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut settings = Settings::default();
        settings.demo.bpm_step = -5;
        let text = settings.to_toml_string().unwrap();
        assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(matches!(
            Settings::from_toml_str("[mixer]\nvoices = \"many\""),
            Err(MasterError::Settings(_))
        ));
    }
}
