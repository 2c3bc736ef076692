//! A stored value paired with its expiration deadline.

use std::time::{Duration, Instant};

use crate::clock::{Deadline, Lifespan};

/// A value stored in a timed container.
///
/// The deadline is fixed at construction. Only [`TimedEntry::rearm`], used by
/// decaying containers, moves it.
#[derive(Debug, Clone)]
pub struct TimedEntry<V> {
    value: V,
    expires_at: Deadline,
    lifespan: Lifespan,
}

impl<V> TimedEntry<V> {
    /// Wrap `value`, stored at `now`, expiring after `lifespan`.
    pub fn new(value: V, lifespan: Lifespan, now: Instant) -> Self {
        Self {
            value,
            expires_at: Deadline::after(now, lifespan),
            lifespan,
        }
    }

    /// The stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consume the entry and return the stored value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Absolute deadline.
    pub fn expires_at(&self) -> Deadline {
        self.expires_at
    }

    /// Lifespan the entry was created with.
    pub fn lifespan(&self) -> Lifespan {
        self.lifespan
    }

    /// Whether the entry is past its deadline at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.has_passed(now)
    }

    /// Time left at `now`; `None` when the entry never expires.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.remaining(now)
    }

    /// Restart the original lifespan from `now`.
    ///
    /// The deadline never moves backwards.
    pub fn rearm(&mut self, now: Instant) {
        let renewed = Deadline::after(now, self.lifespan);
        if renewed > self.expires_at {
            self.expires_at = renewed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock, TimeUnit};

    #[test]
    fn entry_not_expired_before_deadline() {
        let clock = ManualClock::new();
        let entry = TimedEntry::new("v", Lifespan::of(2, TimeUnit::Seconds), clock.now());

        clock.advance_millis(1_500);
        assert!(!entry.is_expired(clock.now()));
        assert_eq!(entry.remaining(clock.now()), Some(Duration::from_millis(500)));
    }

    #[test]
    fn forever_entry_never_expires() {
        let clock = ManualClock::new();
        let entry = TimedEntry::new(1_u32, Lifespan::Forever, clock.now());

        clock.advance(Duration::from_secs(10 * 365 * 86_400));
        assert!(!entry.is_expired(clock.now()));
        assert_eq!(entry.remaining(clock.now()), None);
    }

    #[test]
    fn rearm_pushes_deadline_forward() {
        let clock = ManualClock::new();
        let mut entry = TimedEntry::new('x', Lifespan::of(1, TimeUnit::Seconds), clock.now());
        let first = entry.expires_at();

        clock.advance_millis(600);
        entry.rearm(clock.now());
        assert!(entry.expires_at() > first);

        clock.advance_millis(600);
        assert!(!entry.is_expired(clock.now()), "rearmed entry must survive its first deadline");
    }

    #[test]
    fn entries_order_by_deadline() {
        let clock = ManualClock::new();
        let soon = TimedEntry::new(1, Lifespan::of(1, TimeUnit::Seconds), clock.now());
        let later = TimedEntry::new(2, Lifespan::of(5, TimeUnit::Seconds), clock.now());
        let never = TimedEntry::new(3, Lifespan::Forever, clock.now());

        assert!(soon.expires_at() < later.expires_at());
        assert!(never.expires_at() > later.expires_at());
    }
}
