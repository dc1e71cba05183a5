//! Cooperative timer queue.
//!
//! The host owns the clock; tests and embedders advance it explicitly
//! and due callbacks run in due-time order. Callbacks may schedule or
//! cancel further timers, so the queue is pumped through a shared
//! handle rather than under a long-lived mutable borrow.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

pub type TimerCallback = Rc<dyn Fn()>;

struct Task {
    id: u64,
    due_ms: u64,
    period_ms: Option<u64>,
    callback: TimerCallback,
}

pub struct Scheduler {
    now_ms: u64,
    next_id: u64,
    tasks: Vec<Task>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 1,
            tasks: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn set_timeout(&mut self, callback: TimerCallback, delay_ms: u64) -> u64 {
        self.schedule(callback, delay_ms, None)
    }

    pub fn set_interval(&mut self, callback: TimerCallback, period_ms: u64) -> u64 {
        self.schedule(callback, period_ms, Some(period_ms))
    }

    fn schedule(
        &mut self,
        callback: TimerCallback,
        delay_ms: u64,
        period_ms: Option<u64>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        trace!(id, delay_ms, repeating = period_ms.is_some(), "timer scheduled");
        self.tasks.push(Task {
            id,
            due_ms: self.now_ms + delay_ms,
            period_ms,
            callback,
        });
        id
    }

    /// Cancels a timer by id; unknown ids are a no-op.
    pub fn clear(&mut self, id: u64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    /// Removes the earliest task due at or before `target_ms`, advances
    /// the clock to its due time, and reschedules it if repeating.
    fn pop_due(&mut self, target_ms: u64) -> Option<TimerCallback> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due_ms <= target_ms)
            .min_by_key(|(_, task)| task.due_ms)
            .map(|(i, _)| i)?;
        let task = &mut self.tasks[index];
        self.now_ms = self.now_ms.max(task.due_ms);
        let callback = task.callback.clone();
        match task.period_ms {
            Some(period) => task.due_ms += period.max(1),
            None => {
                self.tasks.remove(index);
            }
        }
        Some(callback)
    }

    /// Advances the clock by `ms`, running every due callback. The
    /// queue borrow is released before each callback runs so callbacks
    /// can schedule and cancel freely.
    pub fn advance(scheduler: &Rc<RefCell<Scheduler>>, ms: u64) {
        let target_ms = scheduler.borrow().now_ms + ms;
        loop {
            let due = scheduler.borrow_mut().pop_due(target_ms);
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
        scheduler.borrow_mut().now_ms = target_ms;
    }
}
