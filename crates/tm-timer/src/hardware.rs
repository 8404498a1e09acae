//! Hardware timer seam.

use alloc::vec::Vec;

/// The interval timer a [`Scheduler`](crate::Scheduler) drives exclusively
/// while installed.
///
/// Implementations deliver ticks by calling `Scheduler::tick` (or
/// `SharedScheduler::tick`) once per timer period.
pub trait TimerHardware: Send {
    /// Save the previous tick handler and hook the dispatcher.
    fn install(&mut self);

    /// Restore the handler saved by `install`.
    fn restore(&mut self);

    /// Program the tick period, in base-clock units (`1..=idle_divisor`).
    fn program(&mut self, divisor: u32);

    /// Invoke the previously installed handler once.
    fn chain(&mut self);
}

/// Timer that only records what it was asked to do.
#[derive(Clone, Debug, Default)]
pub struct SimulatedTimer {
    installed: bool,
    installs: u32,
    divisor: u32,
    programmed: Vec<u32>,
    chained: u64,
}

impl SimulatedTimer {
    /// Create an uninstalled simulated timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is the dispatcher hook currently installed?
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Number of times the hook was installed.
    pub fn installs(&self) -> u32 {
        self.installs
    }

    /// Last programmed divisor (0 if never programmed).
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Every divisor programmed, in order.
    pub fn programmed(&self) -> &[u32] {
        &self.programmed
    }

    /// Number of times the previous handler was chained.
    pub fn chained(&self) -> u64 {
        self.chained
    }
}

impl TimerHardware for SimulatedTimer {
    fn install(&mut self) {
        self.installed = true;
        self.installs += 1;
    }

    fn restore(&mut self) {
        self.installed = false;
    }

    fn program(&mut self, divisor: u32) {
        self.divisor = divisor;
        self.programmed.push(divisor);
    }

    fn chain(&mut self) {
        self.chained += 1;
    }
}
