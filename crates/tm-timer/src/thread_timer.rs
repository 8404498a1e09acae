//! Timer hardware emulated with a background thread.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::IDLE_DIVISOR;
use crate::hardware::TimerHardware;
use crate::shared::SharedScheduler;

/// How long the driver sleeps while no dispatcher is installed.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Lag after which the driver drops missed ticks instead of catching up.
const MAX_LAG: Duration = Duration::from_millis(100);

struct TimerState {
    base_frequency: u32,
    installed: AtomicBool,
    divisor: AtomicU32,
    system_ticks: AtomicU64,
}

/// Interval timer whose ticks are produced by a [`TimerDriver`] thread.
///
/// Chained calls count as ticks of the preserved system clock.
pub struct ThreadTimer {
    state: Arc<TimerState>,
}

impl ThreadTimer {
    pub fn new(base_frequency: u32) -> Self {
        Self {
            state: Arc::new(TimerState {
                base_frequency,
                installed: AtomicBool::new(false),
                divisor: AtomicU32::new(IDLE_DIVISOR),
                system_ticks: AtomicU64::new(0),
            }),
        }
    }

    /// Ticks delivered to the chained system clock.
    pub fn system_ticks(&self) -> u64 {
        self.state.system_ticks.load(Ordering::Relaxed)
    }

    /// Currently programmed divisor.
    pub fn divisor(&self) -> u32 {
        self.state.divisor.load(Ordering::Relaxed)
    }
}

impl TimerHardware for ThreadTimer {
    fn install(&mut self) {
        self.state.installed.store(true, Ordering::Release);
    }

    fn restore(&mut self) {
        self.state.installed.store(false, Ordering::Release);
    }

    fn program(&mut self, divisor: u32) {
        self.state.divisor.store(divisor.max(1), Ordering::Relaxed);
    }

    fn chain(&mut self) {
        self.state.system_ticks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Background thread calling [`SharedScheduler::tick`] at the programmed rate.
pub struct TimerDriver {
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimerDriver {
    /// Start ticking `scheduler`.
    pub fn spawn(scheduler: SharedScheduler<ThreadTimer>) -> std::io::Result<Self> {
        let state = scheduler.with(|s| s.hardware().state.clone());
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = stop_signal.clone();

        let thread = std::thread::Builder::new()
            .name("tm-timer".into())
            .spawn(move || drive(scheduler, state, stop))?;

        Ok(Self {
            stop_signal,
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("timer driver thread panicked");
            }
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drive(scheduler: SharedScheduler<ThreadTimer>, state: Arc<TimerState>, stop: Arc<AtomicBool>) {
    debug!("timer driver started");
    let mut next = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        if !state.installed.load(Ordering::Acquire) {
            std::thread::sleep(IDLE_POLL);
            next = Instant::now();
            continue;
        }

        let divisor = state.divisor.load(Ordering::Relaxed) as u64;
        next += Duration::from_nanos(divisor * 1_000_000_000 / state.base_frequency.max(1) as u64);

        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else if now - next > MAX_LAG {
            next = now;
        }

        scheduler.tick();
    }
    debug!("timer driver stopped");
}
