//! Priority-ordered task collection with a deferred-removal queue.

use alloc::vec::Vec;
use slotmap::SlotMap;

use crate::task::{Task, TaskHandle};
use crate::TimerError;

/// Process-wide task collection.
///
/// Tasks live in a generation-checked arena; `order` holds them ascending by
/// priority. Capacity is reserved up front so servicing never allocates.
pub struct TaskList {
    tasks: SlotMap<TaskHandle, Task>,
    order: Vec<TaskHandle>,
    removals: Vec<TaskHandle>,
    capacity: usize,
}

impl TaskList {
    /// Create an empty list able to hold `capacity` tasks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: SlotMap::with_capacity_and_key(capacity),
            order: Vec::with_capacity(capacity),
            removals: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of linked tasks, including ones pending removal.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no task is linked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true if the handle names a linked task.
    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(handle)
    }

    /// Returns true if the handle names a task that is still serviced.
    pub fn is_active(&self, handle: TaskHandle) -> bool {
        self.tasks.get(handle).is_some_and(Task::is_active)
    }

    /// Priorities in service order.
    pub fn priorities(&self) -> impl Iterator<Item = i32> + '_ {
        self.order.iter().filter_map(|h| self.tasks.get(*h)).map(|t| t.priority)
    }

    /// Link a task before the first task of strictly greater priority.
    pub(crate) fn insert(&mut self, task: Task) -> Result<TaskHandle, TimerError> {
        if self.order.len() >= self.capacity {
            return Err(TimerError::AllocationFailed);
        }
        let priority = task.priority;
        let handle = self.tasks.insert(task);
        let pos = self
            .order
            .iter()
            .position(|h| self.tasks[*h].priority > priority)
            .unwrap_or(self.order.len());
        self.order.insert(pos, handle);
        Ok(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: TaskHandle) -> Option<&mut Task> {
        self.tasks.get_mut(handle)
    }

    /// Handle at a position in service order.
    pub(crate) fn handle_at(&self, index: usize) -> Option<TaskHandle> {
        self.order.get(index).copied()
    }

    pub(crate) fn divisor_of(&self, handle: TaskHandle) -> Option<u32> {
        self.tasks.get(handle).map(|t| t.divisor)
    }

    pub(crate) fn set_divisor(&mut self, handle: TaskHandle, divisor: u32) -> Result<(), TimerError> {
        let task = self.tasks.get_mut(handle).ok_or(TimerError::TaskNotFound)?;
        task.divisor = divisor;
        Ok(())
    }

    /// Smallest period among active tasks, never above `ceiling`.
    pub fn min_divisor(&self, ceiling: u32) -> u32 {
        self.tasks
            .values()
            .filter(|t| t.is_active())
            .map(|t| t.divisor)
            .fold(ceiling, u32::min)
    }

    /// Mark a task for removal and queue it for the next cleanup pass.
    ///
    /// Returns false if the handle is stale.
    pub(crate) fn request_removal(&mut self, handle: TaskHandle) -> bool {
        let Some(task) = self.tasks.get_mut(handle) else {
            return false;
        };
        if task.is_active() {
            task.priority = 0;
            self.removals.push(handle);
        }
        true
    }

    /// Mark a task for removal from outside a service pass.
    ///
    /// Same as a terminate request: the task stops being serviced at once
    /// and is unlinked at the next cleanup. Returns false if the handle is
    /// stale.
    pub fn mark_removed(&mut self, handle: TaskHandle) -> bool {
        self.request_removal(handle)
    }

    /// Returns true if a cleanup pass has work to do.
    pub fn has_pending_removals(&self) -> bool {
        !self.removals.is_empty()
    }

    /// Unlink and free every task marked for removal. Returns how many went.
    pub(crate) fn drain_removals(&mut self) -> usize {
        if self.removals.is_empty() {
            return 0;
        }
        let before = self.order.len();
        let tasks = &mut self.tasks;
        self.order.retain(|h| tasks.get(*h).is_some_and(Task::is_active));
        tasks.retain(|_, t| t.is_active());
        self.removals.clear();
        before - self.order.len()
    }

    /// Free every task unconditionally.
    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
        self.order.clear();
        self.removals.clear();
    }
}
