//! Metronome task: the demo's stand-in for a sequencer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tm_engine::{OutputDevice, SoundEngine};
use tm_timer::{TaskContext, TaskService};
use tracing::debug;

use crate::settings::DemoSettings;
use crate::tone;

/// Sequencer clocks per beat.
pub const CLOCKS_PER_BEAT: u32 = 24;

/// Task rate, in Hz, for a tempo.
pub fn clock_rate(bpm: u32) -> u32 {
    (bpm.saturating_mul(CLOCKS_PER_BEAT) / 60).max(1)
}

/// Plays a click on every beat and an accent on every bar line.
///
/// Runs as a scheduler task at [`clock_rate`]. With a non-zero tempo step it
/// retunes its own rate at each bar line, the way a sequencer does on a
/// tempo change event.
pub struct Metronome<D: OutputDevice + 'static> {
    engine: SoundEngine<D>,
    click: Arc<[u8]>,
    accent: Arc<[u8]>,
    priority: i32,
    beats_per_bar: u32,
    bpm: u32,
    bpm_step: i32,
    clock: u32,
    beats: Arc<AtomicU64>,
}

impl<D: OutputDevice + 'static> Metronome<D> {
    pub fn new(engine: SoundEngine<D>, demo: &DemoSettings, sample_rate: u32, beats: Arc<AtomicU64>) -> Self {
        Self {
            engine,
            click: tone::blip(sample_rate, demo.click_hz, demo.click_ms),
            accent: tone::blip(sample_rate, demo.accent_hz, demo.click_ms),
            priority: demo.priority,
            beats_per_bar: demo.beats_per_bar.max(1),
            bpm: demo.bpm,
            bpm_step: demo.bpm_step,
            clock: 0,
            beats,
        }
    }

    fn beat(&mut self, ctx: &mut TaskContext<'_>) {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed);
        let downbeat = beat % u64::from(self.beats_per_bar) == 0;
        if downbeat && beat > 0 && self.bpm_step != 0 {
            self.bpm = (i64::from(self.bpm) + i64::from(self.bpm_step)).clamp(20, 600) as u32;
            ctx.set_rate(clock_rate(self.bpm));
            debug!(bpm = self.bpm, "tempo change");
        }
        let (sample, priority) = if downbeat {
            (&self.accent, self.priority + 1)
        } else {
            (&self.click, self.priority)
        };
        if let Err(err) = self.engine.play(sample.clone(), sample.len(), priority) {
            debug!(%err, beat, "click dropped");
        }
    }
}

impl<D: OutputDevice + 'static> TaskService for Metronome<D> {
    fn service(&mut self, ctx: &mut TaskContext<'_>) {
        if self.clock == 0 {
            self.beat(ctx);
        }
        self.clock = (self.clock + 1) % CLOCKS_PER_BEAT;
    }
}
