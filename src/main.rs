//! tickmix CLI: render or play the metronome demo.
//!
//! Usage:
//!   tickmix render --out click.wav --seconds 10
//!   tickmix play --seconds 10 --bpm 90

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tm_master::{Controller, MixFormat, Settings};

#[derive(Parser)]
#[command(name = "tickmix")]
#[command(about = "Multi-rate task scheduler and paged voice mixer demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Command {
    /// Render offline to a WAV file
    Render {
        /// Output WAV file
        #[arg(short, long)]
        out: PathBuf,

        /// Length of the render
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f32,
    },
    /// Play on the default audio output
    Play {
        /// How long to play
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f32,
    },
}

#[derive(Args)]
struct Overrides {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Mixing rate in Hz
    #[arg(long, global = true)]
    rate: Option<u32>,

    /// Maximum concurrent voices
    #[arg(long, global = true)]
    voices: Option<usize>,

    /// Mix to 16-bit instead of 8-bit
    #[arg(long, global = true)]
    sixteen_bit: bool,

    /// Metronome tempo
    #[arg(long, global = true)]
    bpm: Option<u32>,
}

impl Overrides {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(rate) = self.rate {
            settings.mixer.sample_rate = rate;
        }
        if let Some(voices) = self.voices {
            settings.mixer.voices = voices;
        }
        if self.sixteen_bit {
            settings.mixer.format = MixFormat::Mono16;
        }
        if let Some(bpm) = self.bpm {
            settings.demo.bpm = bpm;
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.overrides.settings()?;
    tracing::debug!(?settings, "settings loaded");
    let mut ctrl = Controller::new(settings);

    match cli.command {
        Command::Render { out, seconds } => render_to_wav(&ctrl, &out, seconds),
        Command::Play { seconds } => play_audio(&mut ctrl, seconds),
    }
}

fn render_to_wav(ctrl: &Controller, path: &Path, seconds: f32) -> Result<()> {
    let rendered = ctrl.render_offline(seconds).context("render failed")?;
    let wav = rendered.to_wav()?;
    std::fs::write(path, &wav).with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "Wrote {} ({} samples, {} Hz, {} beats)",
        path.display(),
        rendered.samples(),
        rendered.sample_rate,
        rendered.beats
    );
    Ok(())
}

fn play_audio(ctrl: &mut Controller, seconds: f32) -> Result<()> {
    ctrl.play().context("failed to start playback")?;
    println!("Playing...");

    let steps = (seconds.max(0.0) * 100.0) as u32;
    for _ in 0..steps {
        print!("\rBeats: {:4} | Voices: {}", ctrl.beats(), ctrl.active_voices());
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(10));
    }
    ctrl.stop();

    println!("\rDone.                        ");
    Ok(())
}
