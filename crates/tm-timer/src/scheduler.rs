//! The task scheduler: rate bookkeeping and the timer-tick service routine.

use alloc::boxed::Box;
use tracing::{debug, trace};

use crate::config::TimerConfig;
use crate::hardware::TimerHardware;
use crate::task::{Task, TaskContext, TaskHandle, TaskService};
use crate::task_list::TaskList;
use crate::TimerError;

/// Multi-rate dispatcher over one hardware timer.
///
/// The timer is always programmed to the smallest period among active
/// tasks (or the idle divisor when none are). The first `schedule` installs
/// the dispatcher; `shutdown` (or drop) restores the previous handler.
pub struct Scheduler<H: TimerHardware> {
    hardware: H,
    config: TimerConfig,
    list: TaskList,
    /// Divisor currently programmed into the hardware.
    divisor: u32,
    /// Base-clock units elapsed since the chained handler last ran.
    rollover: u32,
    installed: bool,
    dispatching: bool,
}

impl<H: TimerHardware> Scheduler<H> {
    /// Create an uninstalled scheduler owning the given timer.
    pub fn new(hardware: H, config: TimerConfig) -> Self {
        Self {
            hardware,
            list: TaskList::with_capacity(config.max_tasks),
            divisor: config.idle_divisor,
            config,
            rollover: 0,
            installed: false,
            dispatching: false,
        }
    }

    /// Register a periodic task serviced at `rate` Hz.
    ///
    /// Installs the dispatcher on first use. Fails without side effects
    /// when `priority <= 0` or no control block is free.
    pub fn schedule<S>(&mut self, service: S, rate: u32, priority: i32) -> Result<TaskHandle, TimerError>
    where
        S: TaskService + 'static,
    {
        if priority <= 0 {
            return Err(TimerError::InvalidPriority(priority));
        }
        if self.list.len() >= self.config.max_tasks {
            return Err(TimerError::AllocationFailed);
        }
        if !self.installed {
            self.startup();
        }
        let divisor = self.timer_divisor(rate);
        let handle = self.list.insert(Task::new(Box::new(service), divisor, priority))?;
        debug!(?handle, rate, divisor, priority, "task scheduled");
        Ok(handle)
    }

    /// Change a task's service rate and retune the hardware timer.
    pub fn set_rate(&mut self, handle: TaskHandle, rate: u32) -> Result<(), TimerError> {
        if !self.installed {
            return Err(TimerError::NotInstalled);
        }
        if !self.list.contains(handle) {
            return Err(TimerError::TaskNotFound);
        }
        let divisor = self.timer_divisor(rate);
        self.list.set_divisor(handle, divisor)?;
        self.retune();
        Ok(())
    }

    /// Remove a task synchronously.
    ///
    /// Returns whether the task was unlinked. Service routines terminate
    /// through [`TaskContext::terminate`] instead, which defers.
    pub fn terminate(&mut self, handle: TaskHandle) -> Result<bool, TimerError> {
        if !self.installed {
            return Err(TimerError::NotInstalled);
        }
        if !self.list.request_removal(handle) {
            return Err(TimerError::TaskNotFound);
        }
        self.collect_removed();
        Ok(!self.list.contains(handle))
    }

    /// Queue a removal without running cleanup. The next tick (or the next
    /// call to `collect_removed`) unlinks it.
    pub fn defer_termination(&mut self, handle: TaskHandle) -> bool {
        self.list.request_removal(handle)
    }

    /// Enable invocation of service routines.
    pub fn start(&mut self) {
        self.dispatching = true;
    }

    /// Disable invocation of service routines.
    pub fn stop(&mut self) {
        self.dispatching = false;
    }

    /// Restore the previous timer handler and free every task.
    ///
    /// Does nothing if not installed.
    pub fn shutdown(&mut self) {
        if !self.installed {
            return;
        }
        self.program(self.config.idle_divisor);
        self.hardware.restore();
        self.list.clear();
        self.dispatching = false;
        self.installed = false;
        debug!("task scheduler shut down");
    }

    /// Timer interrupt entry point: service due tasks, run deferred
    /// cleanup, then chain the previous handler once per 16-bit rollover.
    pub fn tick(&mut self) {
        self.tick_with(|_| {});
    }

    /// [`tick`](Self::tick) with an outside source of removals.
    ///
    /// `pending` runs before the pass and after every service routine, so
    /// a task it marks through [`TaskList::mark_removed`] is not invoked
    /// again once marked.
    pub fn tick_with(&mut self, mut pending: impl FnMut(&mut TaskList)) {
        if !self.installed {
            return;
        }
        pending(&mut self.list);
        if self.dispatching {
            self.service_tasks(&mut pending);
        }
        pending(&mut self.list);
        self.collect_removed();

        self.rollover += self.divisor;
        if self.rollover > 0xFFFF {
            self.rollover &= 0xFFFF;
            self.hardware.chain();
        }
    }

    /// Unlink tasks marked for removal and retune if the minimum changed.
    pub fn collect_removed(&mut self) {
        if self.list.drain_removals() > 0 {
            self.retune();
        }
    }

    fn service_tasks(&mut self, pending: &mut impl FnMut(&mut TaskList)) {
        let mut index = 0;
        while let Some(handle) = self.list.handle_at(index) {
            index += 1;
            let Some(task) = self.list.get_mut(handle) else {
                continue;
            };
            if !task.is_active() || !task.accumulate(self.divisor) {
                continue;
            }
            let Some(mut service) = task.service.take() else {
                continue;
            };

            let mut ctx = TaskContext::new(&mut self.list, &self.config, handle, self.divisor);
            service.service(&mut ctx);
            let rate_changed = ctx.rate_changed();
            let stop = ctx.stop_requested();

            if let Some(task) = self.list.get_mut(handle) {
                task.service = Some(service);
            }
            pending(&mut self.list);
            if rate_changed {
                self.retune();
            }
            if stop {
                self.dispatching = false;
                break;
            }
        }
    }

    /// Convert a rate to a divisor, speeding the hardware up if needed.
    fn timer_divisor(&mut self, rate: u32) -> u32 {
        let divisor = self.config.divisor_for(rate);
        let hardware = self.config.clamp_hardware(divisor);
        if hardware < self.divisor {
            self.program(hardware);
        }
        divisor
    }

    /// Reprogram to the minimum active period if it differs.
    fn retune(&mut self) {
        let min = self.list.min_divisor(self.config.idle_divisor);
        let min = self.config.clamp_hardware(min);
        if min != self.divisor {
            self.program(min);
        }
    }

    fn program(&mut self, divisor: u32) {
        trace!(from = self.divisor, to = divisor, "programming timer");
        self.divisor = divisor;
        self.hardware.program(divisor);
    }

    fn startup(&mut self) {
        self.list.clear();
        self.dispatching = false;
        self.rollover = 0;
        self.hardware.install();
        self.program(self.config.idle_divisor);
        self.installed = true;
        debug!(base = self.config.base_frequency, "task scheduler installed");
    }

    /// Divisor currently programmed into the hardware timer.
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Hardware tick rate in Hz.
    pub fn tick_rate(&self) -> u32 {
        self.config.base_frequency / self.divisor
    }

    /// Number of linked tasks.
    pub fn task_count(&self) -> usize {
        self.list.len()
    }

    /// Is the handle a live task?
    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.list.contains(handle)
    }

    /// Is the dispatcher installed?
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Are service routines being invoked?
    pub fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// The task collection.
    pub fn tasks(&self) -> &TaskList {
        &self.list
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// The timer being driven.
    pub fn hardware(&self) -> &H {
        &self.hardware
    }
}

impl<H: TimerHardware> Drop for Scheduler<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
