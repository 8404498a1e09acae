//! Headless controller for tickmix.
//!
//! Wires the task scheduler and the mixing engine together behind one API
//! for offline rendering and live playback, shared by the CLI and tests.

mod metronome;
mod settings;
mod tone;
mod wav;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tm_audio::{CaptureDevice, CpalDevice, TapRead};
use tm_engine::{MixError, SoundEngine};
use tm_timer::{Scheduler, SharedScheduler, SimulatedTimer, ThreadTimer, TimerDriver, TimerError};
use tracing::info;

pub use metronome::{clock_rate, Metronome, CLOCKS_PER_BEAT};
pub use settings::{DemoSettings, Settings};
pub use tm_engine::{MixFormat, MixerConfig};
pub use tm_timer::TimerConfig;
pub use tone::blip;
pub use wav::{pcm_to_wav, write_wav};

/// Error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("could not encode settings: {0}")]
    SettingsEncode(#[from] toml::ser::Error),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Mix(#[from] MixError),
}

/// Output of an offline render.
#[derive(Clone, Debug)]
pub struct Rendered {
    /// Every page the device played, in order.
    pub pcm: Vec<u8>,
    pub format: MixFormat,
    pub sample_rate: u32,
    /// Metronome beats triggered.
    pub beats: u64,
}

impl Rendered {
    pub fn samples(&self) -> usize {
        self.pcm.len() / self.format.sample_bytes()
    }

    pub fn to_wav(&self) -> std::io::Result<Vec<u8>> {
        pcm_to_wav(&self.pcm, self.format, self.sample_rate)
    }
}

/// Headless controller: owns settings and any live playback.
pub struct Controller {
    settings: Settings,
    live: Option<LivePlayback>,
}

struct LivePlayback {
    driver: TimerDriver,
    scheduler: SharedScheduler<ThreadTimer>,
    engine: SoundEngine<CpalDevice>,
    beats: Arc<AtomicU64>,
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        Self { settings, live: None }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // --- Offline rendering ---

    /// Run the metronome for `seconds` against a simulated clock and collect
    /// every page the output device would have played.
    ///
    /// The clock advances one page duration at a time; the scheduler gets
    /// however many timer ticks fit in it at the programmed divisor, then
    /// the page completes.
    pub fn render_offline(&self, seconds: f32) -> Result<Rendered, MasterError> {
        let settings = &self.settings;
        let rate = settings.mixer.sample_rate;

        let device = CaptureDevice::new();
        let tap = device.tap();
        let engine = SoundEngine::new();
        engine.init(device, settings.mixer)?;
        let (format, capacity, page_bytes) =
            engine.with(|m| (m.format(), m.page_capacity(), m.config().page_bytes))?;

        let beats = Arc::new(AtomicU64::new(0));
        let metronome = Metronome::new(engine.clone(), &settings.demo, rate, beats.clone());
        let mut scheduler = Scheduler::new(SimulatedTimer::new(), settings.timer);
        scheduler.schedule(metronome, clock_rate(settings.demo.bpm), 1)?;
        scheduler.start();

        let samples = (seconds.max(0.0) * rate as f32) as u64;
        let pages = samples.div_ceil(capacity as u64);
        let mut pcm = Vec::with_capacity(pages as usize * page_bytes);
        let mut page = vec![0u8; page_bytes];
        let page_cost = capacity as u64 * u64::from(settings.timer.base_frequency);
        let mut clock = 0u64;

        for _ in 0..pages {
            clock += page_cost;
            loop {
                let tick_cost = u64::from(scheduler.divisor()) * u64::from(rate);
                if clock < tick_cost {
                    break;
                }
                clock -= tick_cost;
                scheduler.tick();
            }
            match tap.pull(&mut page) {
                TapRead::Page(n) => pcm.extend_from_slice(&page[..n]),
                TapRead::Idle | TapRead::Busy => {
                    pcm.resize(pcm.len() + page_bytes, format.silence());
                }
            }
        }

        scheduler.shutdown();
        engine.shutdown();
        let beats = beats.load(Ordering::Relaxed);
        info!(pages, beats, "offline render finished");
        Ok(Rendered { pcm, format, sample_rate: rate, beats })
    }

    /// Render `seconds` straight to WAV bytes.
    pub fn render_to_wav(&self, seconds: f32) -> Result<Vec<u8>, MasterError> {
        Ok(self.render_offline(seconds)?.to_wav()?)
    }

    // --- Live playback ---

    /// Start the metronome on the default audio output, timed by a
    /// background timer thread.
    pub fn play(&mut self) -> Result<(), MasterError> {
        self.stop();
        let settings = &self.settings;

        let engine = SoundEngine::new();
        engine.init(CpalDevice::new(), settings.mixer)?;
        let scheduler = SharedScheduler::new(ThreadTimer::new(settings.timer.base_frequency), settings.timer);
        let beats = Arc::new(AtomicU64::new(0));
        let metronome = Metronome::new(engine.clone(), &settings.demo, settings.mixer.sample_rate, beats.clone());
        scheduler.schedule(metronome, clock_rate(settings.demo.bpm), 1)?;
        scheduler.start();
        let driver = TimerDriver::spawn(scheduler.clone())?;

        info!(bpm = settings.demo.bpm, "live playback started");
        self.live = Some(LivePlayback { driver, scheduler, engine, beats });
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.driver.stop();
            live.scheduler.shutdown();
            live.engine.shutdown();
            info!(beats = live.beats.load(Ordering::Relaxed), "live playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.live.is_some()
    }

    /// Beats played by the live metronome.
    pub fn beats(&self) -> u64 {
        self.live.as_ref().map_or(0, |live| live.beats.load(Ordering::Relaxed))
    }

    /// Voices sounding on the page being played live.
    pub fn active_voices(&self) -> usize {
        self.live.as_ref().map_or(0, |live| live.engine.active_count())
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
