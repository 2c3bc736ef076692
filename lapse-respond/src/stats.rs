//! Request counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by a registry and every request it created.
#[derive(Debug, Default)]
pub struct RequestCounters {
    /// Requests accepted by `submit`.
    pub submitted: AtomicU64,
    /// Requests refused by `submit`.
    pub rejected: AtomicU64,
    /// Requests answered.
    pub responded: AtomicU64,
    /// Requests cancelled.
    pub cancelled: AtomicU64,
    /// Requests that timed out.
    pub timed_out: AtomicU64,
    /// Replies that matched several requests and were bounced back.
    pub ambiguous: AtomicU64,
}

impl RequestCounters {
    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            responded: self.responded.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            ambiguous: self.ambiguous.load(Ordering::Relaxed),
        }
    }
}

/// Request counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Requests accepted by `submit`.
    pub submitted: u64,
    /// Requests refused by `submit`.
    pub rejected: u64,
    /// Requests answered.
    pub responded: u64,
    /// Requests cancelled.
    pub cancelled: u64,
    /// Requests that timed out.
    pub timed_out: u64,
    /// Replies bounced back as ambiguous.
    pub ambiguous: u64,
}

impl RequestStats {
    /// Requests submitted that have not finished yet.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.responded + self.cancelled + self.timed_out)
    }
}
