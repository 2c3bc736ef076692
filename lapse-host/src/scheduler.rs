//! Cooperative tick scheduler.
//!
//! Tasks wait in a run queue ordered by the tick they are due on. Each call
//! to [`TickScheduler::tick`] advances the clock by one tick and runs every
//! task that became due, outside the queue lock so tasks may schedule more
//! work. Repeating tasks go back into the queue; cancelled ones are dropped
//! when they come up.
//!
//! ```text
//!   tick() ─▶ clock + 1 ─▶ split due ─▶ run (isolated) ─▶ requeue repeating
//! ```

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use lapse_core::metrics::spans;
use lapse_core::subscriber::call_isolated;
use lapse_core::{Cancellable, Scheduler, TaskHandle};
use lapse_core::schedule::{OnceTask, RepeatingTask};

use crate::clock::TickClock;

enum Body {
    Once(OnceTask),
    Repeating { interval: u64, run: RepeatingTask },
}

struct Task {
    handle: TaskHandle,
    body: Body,
}

#[derive(Default)]
struct RunQueue {
    /// Keyed by `(due tick, task id)` so same-tick tasks run in submission order.
    due: BTreeMap<(u64, u64), Task>,
    next_id: u64,
}

/// Single-threaded run queue driven one tick at a time.
pub struct TickScheduler {
    clock: Arc<TickClock>,
    queue: Mutex<RunQueue>,
}

impl TickScheduler {
    /// Create a scheduler with its own clock at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(TickClock::new()),
            queue: Mutex::new(RunQueue::default()),
        }
    }

    /// The clock this scheduler advances.
    #[must_use]
    pub fn clock(&self) -> Arc<TickClock> {
        Arc::clone(&self.clock)
    }

    /// Ticks run so far.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.clock.current_tick()
    }

    /// Tasks still queued and not cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .due
            .values()
            .filter(|task| !task.handle.is_cancelled())
            .count()
    }

    /// Advance one tick and run everything due. Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let now = self.clock.advance();
        let _span = tracing::trace_span!(spans::HOST_TICK, tick = now).entered();

        let due = {
            let mut queue = self.queue.lock();
            let later = queue.due.split_off(&(now + 1, 0));
            mem::replace(&mut queue.due, later)
        };

        let mut ran = 0;
        for ((_, id), task) in due {
            if task.handle.is_cancelled() {
                trace!(task = id, "Dropping cancelled task");
                continue;
            }
            let label = format!("task-{id}");
            match task.body {
                Body::Once(run) => {
                    call_isolated(&label, run);
                }
                Body::Repeating { interval, mut run } => {
                    call_isolated(&label, &mut run);
                    if !task.handle.is_cancelled() {
                        self.queue.lock().due.insert(
                            (now + interval, id),
                            Task {
                                handle: task.handle,
                                body: Body::Repeating { interval, run },
                            },
                        );
                    }
                }
            }
            ran += 1;
        }
        ran
    }

    /// Run `ticks` ticks back to back. Returns how many tasks ran in total.
    pub fn run_ticks(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }

    fn enqueue(&self, delay: u64, body: Body) -> TaskHandle {
        let mut queue = self.queue.lock();
        queue.next_id += 1;
        let id = queue.next_id;
        let handle = TaskHandle::new(id);
        let due = self.clock.current_tick() + delay.max(1);
        queue.due.insert(
            (due, id),
            Task {
                handle: handle.clone(),
                body,
            },
        );
        trace!(task = id, due, "Task queued");
        handle
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TickScheduler {
    /// A zero delay or interval is treated as one tick.
    fn schedule_repeating(&self, start_delay: u64, interval: u64, task: RepeatingTask) -> TaskHandle {
        self.enqueue(
            start_delay,
            Body::Repeating {
                interval: interval.max(1),
                run: task,
            },
        )
    }

    fn schedule_once(&self, delay: u64, task: OnceTask) -> TaskHandle {
        self.enqueue(delay, Body::Once(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn once_runs_on_its_tick_only() {
        let scheduler = TickScheduler::new();
        let (count, mut bump) = counter();
        scheduler.schedule_once(3, Box::new(move || bump()));

        assert_eq!(scheduler.run_ticks(2), 0);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(scheduler.run_ticks(10), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn repeating_runs_every_interval() {
        let scheduler = TickScheduler::new();
        let (count, bump) = counter();
        scheduler.schedule_repeating(2, 5, Box::new(bump));

        scheduler.run_ticks(2);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        scheduler.run_ticks(4);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        scheduler.tick();
        assert_eq!(count.load(Ordering::Relaxed), 2);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn cancelled_task_is_dropped() {
        let scheduler = TickScheduler::new();
        let (count, bump) = counter();
        let handle = scheduler.schedule_repeating(1, 1, Box::new(bump));

        scheduler.tick();
        assert!(handle.cancel());
        assert_eq!(scheduler.pending(), 0);
        scheduler.run_ticks(5);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn panicking_task_keeps_its_schedule() {
        let scheduler = TickScheduler::new();
        let (count, mut bump) = counter();
        scheduler.schedule_repeating(
            1,
            1,
            Box::new(move || {
                bump();
                panic!("task failure");
            }),
        );

        scheduler.run_ticks(3);
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn tasks_can_schedule_tasks() {
        let scheduler = Arc::new(TickScheduler::new());
        let (count, mut bump) = counter();
        let inner = Arc::clone(&scheduler);
        scheduler.schedule_once(
            1,
            Box::new(move || {
                inner.schedule_once(1, Box::new(move || bump()));
            }),
        );

        scheduler.tick();
        assert_eq!(count.load(Ordering::Relaxed), 0);
        scheduler.tick();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
