//! Integration test: settings → offline render → WAV bytes.

use tm_master::{Controller, MixFormat, Settings};

fn beats_for(settings: Settings, seconds: f32) -> u64 {
    Controller::new(settings).render_offline(seconds).unwrap().beats
}

#[test]
fn render_produces_wav_of_requested_length() {
    let ctrl = Controller::default();
    let wav = ctrl.render_to_wav(3.0).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize;
    assert_eq!(data_size, wav.len() - 44);
    // 3 s at 11025 Hz in whole 128-sample pages.
    assert_eq!(data_size, 259 * 128);
}

#[test]
fn faster_tempo_gives_more_beats() {
    let mut slow = Settings::default();
    slow.demo.bpm = 60;
    let mut fast = Settings::default();
    fast.demo.bpm = 240;
    let slow_beats = beats_for(slow, 4.0);
    let fast_beats = beats_for(fast, 4.0);
    assert!((4..=5).contains(&slow_beats), "{slow_beats}");
    assert!((16..=17).contains(&fast_beats), "{fast_beats}");
}

#[test]
fn tempo_steps_accelerate() {
    let mut steady = Settings::default();
    steady.demo.bpm = 120;
    let mut rising = steady.clone();
    rising.demo.bpm_step = 60;
    assert!(beats_for(rising, 6.0) > beats_for(steady, 6.0));
}

#[test]
fn single_voice_survives_overlapping_clicks() {
    let mut settings = Settings::default();
    settings.mixer.voices = 1;
    settings.demo.bpm = 600;
    settings.demo.click_ms = 500;
    // Every click outlives the beat, so each one competes for the only voice.
    let rendered = Controller::new(settings).render_offline(2.0).unwrap();
    assert!(rendered.beats >= 19);
    assert!(rendered.pcm.iter().any(|&b| b != 0x80));
}

#[test]
fn settings_file_drives_render() {
    let path = std::env::temp_dir().join(format!("tickmix-render-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "[mixer]\nformat = \"Mono16\"\nsample_rate = 8000\npage_bytes = 256\n\n[demo]\nbpm = 90\n",
    )
    .unwrap();
    let settings = Settings::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let rendered = Controller::new(settings).render_offline(1.0).unwrap();
    assert_eq!(rendered.format, MixFormat::Mono16);
    assert_eq!(rendered.sample_rate, 8000);
    // 128 samples per 256-byte page.
    assert_eq!(rendered.samples(), 63 * 128);
    let wav = rendered.to_wav().unwrap();
    assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
}
