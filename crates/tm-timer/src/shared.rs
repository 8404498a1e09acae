//! Lock-guarded scheduler shared between mainline code and a tick driver.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::trace;

use crate::config::TimerConfig;
use crate::hardware::TimerHardware;
use crate::scheduler::Scheduler;
use crate::task::{TaskHandle, TaskService};
use crate::TimerError;

/// Cloneable handle to one installed [`Scheduler`].
///
/// The scheduler mutex stands in for disabling the timer interrupt: a tick
/// holds it for the whole service pass, and every mainline operation runs
/// inside it. Terminations go through a separate queue so they can be
/// requested while a pass is in flight, including from a service routine.
///
/// Service routines must not call `schedule`, `set_rate`, `start`, `stop` or
/// `shutdown` on a handle to the scheduler running them; they get a
/// [`TaskContext`](crate::TaskContext) for that.
pub struct SharedScheduler<H: TimerHardware> {
    inner: Arc<Inner<H>>,
}

struct Inner<H: TimerHardware> {
    scheduler: Mutex<Scheduler<H>>,
    removals: Mutex<Vec<TaskHandle>>,
}

impl<H: TimerHardware> Clone for SharedScheduler<H> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<H: TimerHardware> SharedScheduler<H> {
    pub fn new(hardware: H, config: TimerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                removals: Mutex::new(Vec::with_capacity(config.max_tasks)),
                scheduler: Mutex::new(Scheduler::new(hardware, config)),
            }),
        }
    }

    /// Enter the critical section. Queued removals are applied first.
    fn critical_section(&self) -> MutexGuard<'_, Scheduler<H>> {
        let mut scheduler = self.inner.scheduler.lock();
        self.apply_removals(&mut scheduler);
        scheduler
    }

    fn apply_removals(&self, scheduler: &mut Scheduler<H>) {
        let mut queue = self.inner.removals.lock();
        if queue.is_empty() {
            return;
        }
        for handle in queue.drain(..) {
            scheduler.defer_termination(handle);
        }
        drop(queue);
        scheduler.collect_removed();
    }

    /// See [`Scheduler::schedule`].
    pub fn schedule<S>(&self, service: S, rate: u32, priority: i32) -> Result<TaskHandle, TimerError>
    where
        S: TaskService + 'static,
    {
        self.critical_section().schedule(service, rate, priority)
    }

    /// See [`Scheduler::set_rate`].
    pub fn set_rate(&self, handle: TaskHandle, rate: u32) -> Result<(), TimerError> {
        self.critical_section().set_rate(handle, rate)
    }

    /// Request removal of a task.
    ///
    /// With no pass in flight the task is unlinked before returning and the
    /// result says whether it was. Otherwise the request is queued and
    /// `Ok(true)` is returned; the in-flight pass stops servicing the task
    /// before its next routine and unlinks it when the pass ends.
    pub fn terminate(&self, handle: TaskHandle) -> Result<bool, TimerError> {
        match self.inner.scheduler.try_lock() {
            Some(mut scheduler) => {
                self.apply_removals(&mut scheduler);
                scheduler.terminate(handle)
            }
            None => {
                trace!(?handle, "termination queued behind in-flight pass");
                self.inner.removals.lock().push(handle);
                Ok(true)
            }
        }
    }

    /// See [`Scheduler::start`].
    pub fn start(&self) {
        self.critical_section().start();
    }

    /// See [`Scheduler::stop`].
    pub fn stop(&self) {
        self.critical_section().stop();
    }

    /// See [`Scheduler::shutdown`].
    pub fn shutdown(&self) {
        let mut scheduler = self.inner.scheduler.lock();
        self.inner.removals.lock().clear();
        scheduler.shutdown();
    }

    /// Timer entry point, called by the tick driver.
    ///
    /// Queued removals are marked before the pass and between service
    /// routines, so a task terminated through a handle is never invoked
    /// after `terminate` returns.
    pub fn tick(&self) {
        let mut scheduler = self.inner.scheduler.lock();
        let removals = &self.inner.removals;
        scheduler.tick_with(|list| {
            let mut queue = removals.lock();
            for handle in queue.drain(..) {
                list.mark_removed(handle);
            }
        });
    }

    /// Read scheduler state inside the critical section.
    pub fn with<R>(&self, f: impl FnOnce(&Scheduler<H>) -> R) -> R {
        f(&self.critical_section())
    }

    /// Divisor currently programmed into the hardware timer.
    pub fn divisor(&self) -> u32 {
        self.with(Scheduler::divisor)
    }

    /// Is the dispatcher installed?
    pub fn is_installed(&self) -> bool {
        self.with(Scheduler::is_installed)
    }
}
