//! Timer configuration and rate-to-divisor conversion.

use serde::{Deserialize, Serialize};

/// Input frequency of the PC interval timer, in Hz.
pub const DEFAULT_BASE_FREQUENCY: u32 = 1_193_180;

/// Slowest programmable divisor (a 16-bit counter reload of zero).
pub const IDLE_DIVISOR: u32 = 0x10000;

/// Scheduler configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Frequency of the timer's input clock.
    pub base_frequency: u32,
    /// Divisor programmed when no task is active; also the largest
    /// divisor the hardware can represent.
    pub idle_divisor: u32,
    /// Maximum number of task control blocks.
    pub max_tasks: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            base_frequency: DEFAULT_BASE_FREQUENCY,
            idle_divisor: IDLE_DIVISOR,
            max_tasks: 32,
        }
    }
}

impl TimerConfig {
    /// Convert a requested service rate (Hz) into a tick period in base-clock units.
    ///
    /// Floor division against the base frequency. A zero rate maps to the
    /// idle divisor; rates above the base frequency map to one.
    pub fn divisor_for(&self, rate: u32) -> u32 {
        if rate == 0 {
            return self.idle_divisor;
        }
        (self.base_frequency / rate).max(1)
    }

    /// Clamp a divisor into the range the hardware counter can hold.
    pub fn clamp_hardware(&self, divisor: u32) -> u32 {
        divisor.clamp(1, self.idle_divisor)
    }
}
