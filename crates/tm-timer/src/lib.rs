//! Multi-rate task scheduler for tickmix.
//!
//! One hardware timer is programmed to the fastest rate any task needs and
//! every task is serviced at its own rate through drift-free accumulation.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod config;
mod hardware;
mod scheduler;
mod task;
mod task_list;

#[cfg(feature = "std")]
mod shared;
#[cfg(feature = "std")]
mod thread_timer;

pub use config::{TimerConfig, DEFAULT_BASE_FREQUENCY, IDLE_DIVISOR};
pub use hardware::{SimulatedTimer, TimerHardware};
pub use scheduler::Scheduler;
pub use task::{TaskContext, TaskHandle, TaskService};
pub use task_list::TaskList;

#[cfg(feature = "std")]
pub use shared::SharedScheduler;
#[cfg(feature = "std")]
pub use thread_timer::{ThreadTimer, TimerDriver};

/// Error type for scheduler operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// No task control block is available.
    #[error("no task control block available")]
    AllocationFailed,
    /// Priority must be positive.
    #[error("invalid task priority {0}: must be greater than zero")]
    InvalidPriority(i32),
    /// The handle does not name a live task.
    #[error("no task with matching handle found")]
    TaskNotFound,
    /// The dispatcher has not been installed.
    #[error("task scheduler not installed")]
    NotInstalled,
}
