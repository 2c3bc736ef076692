//! Host scheduler capability.
//!
//! The core never owns a thread. It asks the host for "run this after N
//! ticks" and "run this every N ticks", and gets back a [`TaskHandle`] that
//! can be cancelled through the [`Cancellable`] capability.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something that can be called off before it completes.
pub trait Cancellable {
    /// Cancel. Returns `true` if this call performed the cancellation.
    fn cancel(&self) -> bool;

    /// Whether cancellation already happened.
    fn is_cancelled(&self) -> bool;
}

/// Task body run repeatedly by the host.
pub type RepeatingTask = Box<dyn FnMut() + Send>;

/// Task body run once by the host.
pub type OnceTask = Box<dyn FnOnce() + Send>;

/// Handle to a scheduled task. Clones refer to the same task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a live handle for task `id`.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Host-assigned task id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Cancellable for TaskHandle {
    fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Tick-based scheduler provided by the host.
///
/// Delays and intervals are counted in host ticks.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `interval` ticks, first after `start_delay` ticks.
    fn schedule_repeating(&self, start_delay: u64, interval: u64, task: RepeatingTask) -> TaskHandle;

    /// Run `task` once after `delay` ticks.
    fn schedule_once(&self, delay: u64, task: OnceTask) -> TaskHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_reported_once() {
        let handle = TaskHandle::new(7);
        let clone = handle.clone();

        assert!(!clone.is_cancelled());
        assert!(handle.cancel());
        assert!(!clone.cancel(), "second cancel must report it was already done");
        assert!(clone.is_cancelled());
        assert_eq!(clone.id(), 7);
    }
}
