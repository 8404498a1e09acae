//! Task control blocks and the service-routine interface.

use alloc::boxed::Box;

use crate::config::TimerConfig;
use crate::task_list::TaskList;

slotmap::new_key_type! {
    /// Generation-checked handle to a scheduled task.
    pub struct TaskHandle;
}

/// A periodic activity serviced from the timer tick.
///
/// The implementing value carries whatever data the caller needs; closures
/// taking `&mut TaskContext<'_>` implement it directly.
pub trait TaskService: Send {
    fn service(&mut self, ctx: &mut TaskContext<'_>);
}

impl<F> TaskService for F
where
    F: FnMut(&mut TaskContext<'_>) + Send,
{
    fn service(&mut self, ctx: &mut TaskContext<'_>) {
        self(ctx)
    }
}

/// One scheduled task.
pub(crate) struct Task {
    /// Service routine. Taken out while it runs.
    pub(crate) service: Option<Box<dyn TaskService>>,
    /// Period in base-clock units.
    pub(crate) divisor: u32,
    /// Base-clock units accumulated since the last invocation.
    pub(crate) count: u32,
    /// Positive while active; zero or below once removal is requested.
    pub(crate) priority: i32,
}

impl Task {
    pub(crate) fn new(service: Box<dyn TaskService>, divisor: u32, priority: i32) -> Self {
        Self {
            service: Some(service),
            divisor,
            count: 0,
            priority,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.priority > 0
    }

    /// Accumulate one hardware tick. Returns true when the task is due.
    ///
    /// The remainder carries into the next period, so the long-run rate is
    /// exact without floating point.
    pub(crate) fn accumulate(&mut self, tick_divisor: u32) -> bool {
        self.count = self.count.saturating_add(tick_divisor);
        if self.count >= self.divisor {
            self.count -= self.divisor;
            true
        } else {
            false
        }
    }
}

/// View of the scheduler handed to a service routine while it runs.
///
/// Everything requested here takes effect without re-entering the
/// scheduler's locked entry points; removals are deferred to the cleanup
/// pass that follows the in-flight tick.
pub struct TaskContext<'a> {
    list: &'a mut TaskList,
    config: &'a TimerConfig,
    handle: TaskHandle,
    tick_divisor: u32,
    rate_changed: bool,
    stop: bool,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        list: &'a mut TaskList,
        config: &'a TimerConfig,
        handle: TaskHandle,
        tick_divisor: u32,
    ) -> Self {
        Self {
            list,
            config,
            handle,
            tick_divisor,
            rate_changed: false,
            stop: false,
        }
    }

    /// Handle of the task being serviced.
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Divisor the hardware timer is ticking at.
    pub fn tick_divisor(&self) -> u32 {
        self.tick_divisor
    }

    /// This task's own period in base-clock units.
    pub fn divisor(&self) -> u32 {
        self.list.divisor_of(self.handle).unwrap_or(0)
    }

    /// Is the handle still linked? Tasks terminated during this pass stay
    /// linked until the pass ends.
    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.list.contains(handle)
    }

    /// Change this task's service rate (Hz). The hardware timer is
    /// reprogrammed before the next task in the pass is serviced.
    pub fn set_rate(&mut self, rate: u32) {
        let divisor = self.config.divisor_for(rate);
        if self.list.set_divisor(self.handle, divisor).is_ok() {
            self.rate_changed = true;
        }
    }

    /// Request removal of a task (this one or another).
    ///
    /// Always deferred: the task stops being serviced immediately and is
    /// unlinked after the current pass. Returns false if the handle is stale.
    pub fn terminate(&mut self, handle: TaskHandle) -> bool {
        self.list.request_removal(handle)
    }

    /// Disable dispatching and end the current pass.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    pub(crate) fn rate_changed(&self) -> bool {
        self.rate_changed
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop
    }
}
