//! Frame scheduler used for deferred delivery.
//!
//! The host drains the queue once per update/frame with [`FrameScheduler::run_frame`].
//! Tasks queued while a frame is being drained run on the following frame, so a
//! deferred callback that triggers more deferred work never starves the loop.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

type DeferredTask = Box<dyn FnOnce()>;

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on tasks run per frame (0 = unlimited)
    pub max_tasks_per_frame: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: 0,
        }
    }
}

/// Scheduler counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Frames drained so far
    pub frames: u64,
    /// Tasks executed across all frames
    pub tasks_run: u64,
    /// Tasks ever queued
    pub tasks_queued: u64,
}

struct SchedulerInner {
    config: SchedulerConfig,
    queue: RefCell<VecDeque<DeferredTask>>,
    frame: Cell<u64>,
    stats: RefCell<SchedulerStats>,
}

/// FIFO queue of deferred tasks, cheaply cloneable handle.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Rc<SchedulerInner>,
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("frame", &self.inner.frame.get())
            .field("pending", &self.pending())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                config,
                queue: RefCell::new(VecDeque::new()),
                frame: Cell::new(0),
                stats: RefCell::new(SchedulerStats::default()),
            }),
        }
    }

    /// Queues a task for the next frame.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
        self.inner.stats.borrow_mut().tasks_queued += 1;
    }

    /// Runs the tasks that were queued before this call, in FIFO order.
    ///
    /// Returns the number of tasks executed. With a per-frame budget, tasks
    /// beyond the budget stay at the front of the queue for the next frame.
    pub fn run_frame(&self) -> usize {
        let frame = self.inner.frame.get() + 1;
        self.inner.frame.set(frame);

        let queued = self.inner.queue.borrow().len();
        let budget = match self.inner.config.max_tasks_per_frame {
            0 => queued,
            limit => queued.min(limit),
        };

        let mut executed = 0;
        while executed < budget {
            // Never hold the queue borrow while a task runs: tasks may defer more work.
            let task = self.inner.queue.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    executed += 1;
                }
                None => break,
            }
        }

        {
            let mut stats = self.inner.stats.borrow_mut();
            stats.frames += 1;
            stats.tasks_run += executed as u64;
        }

        if executed > 0 {
            trace!("⏱️ Frame {} ran {} deferred task(s)", frame, executed);
        }
        if queued > budget {
            debug!(
                "⏳ Frame {} budget exhausted, {} deferred task(s) carried over",
                frame,
                queued - budget
            );
        }
        executed
    }

    /// Number of tasks waiting for a frame.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Index of the last frame drained.
    pub fn frame(&self) -> u64 {
        self.inner.frame.get()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.borrow().clone()
    }

    /// Drops every pending task without running it.
    pub fn clear(&self) -> usize {
        let dropped = std::mem::take(&mut *self.inner.queue.borrow_mut());
        dropped.len()
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_fifo_order_on_next_frame() {
        let scheduler = FrameScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            scheduler.defer(move || log.borrow_mut().push(i));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.pending(), 3);

        assert_eq!(scheduler.run_frame(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(scheduler.frame(), 1);
    }

    #[test]
    fn test_tasks_deferred_during_frame_wait_for_next_frame() {
        let scheduler = FrameScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_log = log.clone();
        let inner_scheduler = scheduler.clone();
        scheduler.defer(move || {
            inner_log.borrow_mut().push("outer");
            let nested_log = inner_log.clone();
            inner_scheduler.defer(move || nested_log.borrow_mut().push("nested"));
        });

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "nested"]);
    }

    #[test]
    fn test_budget_carries_tasks_over() {
        let scheduler = FrameScheduler::with_config(SchedulerConfig {
            max_tasks_per_frame: 2,
        });
        let count = Rc::new(Cell::new(0));
        for _ in 0..5 {
            let count = count.clone();
            scheduler.defer(move || count.set(count.get() + 1));
        }

        assert_eq!(scheduler.run_frame(), 2);
        assert_eq!(scheduler.run_frame(), 2);
        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(count.get(), 5);

        let stats = scheduler.stats();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.tasks_run, 5);
        assert_eq!(stats.tasks_queued, 5);
    }

    #[test]
    fn test_clear_discards_pending_tasks() {
        let scheduler = FrameScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        scheduler.defer(move || flag.set(true));

        assert_eq!(scheduler.clear(), 1);
        assert_eq!(scheduler.run_frame(), 0);
        assert!(!ran.get());
    }
}
