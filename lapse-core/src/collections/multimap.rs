//! Timed one-to-many map.
//!
//! Every value under a key carries its own deadline. A sweep groups what
//! expired by key, so a listener hears about a key once per pass no matter
//! how many of its values lapsed together.
//!
//! Keys are ordered by when their bucket was opened: a key whose values all
//! went away and came back later moves to the end.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::clock::Lifespan;
use crate::entry::TimedEntry;
use crate::janitor::Janitor;
use crate::subscriber::{ExpiryListener, ExpiryRegistry};

use super::{Backing, Shell};

struct Bucket<V> {
    opened: u64,
    entries: Vec<TimedEntry<V>>,
}

impl<V> Bucket<V> {
    fn has_live(&self, now: Instant) -> bool {
        self.entries.iter().any(|e| !e.is_expired(now))
    }
}

pub(crate) struct MultimapState<K, V> {
    buckets: HashMap<K, Bucket<V>>,
    next_bucket: u64,
    listeners: ExpiryRegistry<K, V>,
}

impl<K: Eq + Hash, V> MultimapState<K, V> {
    fn live(&self, key: &K, now: Instant) -> impl Iterator<Item = &TimedEntry<V>> {
        self.buckets
            .get(key)
            .into_iter()
            .flat_map(|bucket| &bucket.entries)
            .filter(move |entry| !entry.is_expired(now))
    }

    fn push(&mut self, key: K, entry: TimedEntry<V>) {
        let next = &mut self.next_bucket;
        self.buckets
            .entry(key)
            .or_insert_with(|| {
                *next += 1;
                Bucket {
                    opened: *next,
                    entries: Vec::new(),
                }
            })
            .entries
            .push(entry);
    }

    /// Buckets in the order they were opened.
    fn ordered(&self) -> Vec<(&K, &Bucket<V>)> {
        let mut buckets: Vec<_> = self.buckets.iter().collect();
        buckets.sort_unstable_by_key(|(_, bucket)| bucket.opened);
        buckets
    }

    /// Remove live values under `key` matching `pred`, keeping expired ones
    /// for the sweep.
    fn take_live<F>(&mut self, key: &K, now: Instant, mut pred: F) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
    {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return Vec::new();
        };
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(bucket.entries.len());
        for entry in bucket.entries.drain(..) {
            if !entry.is_expired(now) && pred(entry.value()) {
                taken.push(entry.into_value());
            } else {
                kept.push(entry);
            }
        }
        if kept.is_empty() {
            self.buckets.remove(key);
        } else {
            bucket.entries = kept;
        }
        taken
    }
}

impl<K, V> Backing for MultimapState<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    type Key = K;
    type Value = V;

    fn take_expired(&mut self, now: Instant) -> Vec<(K, Vec<V>)> {
        let mut batches = Vec::new();
        self.buckets.retain(|key, bucket| {
            if bucket.entries.iter().any(|entry| entry.is_expired(now)) {
                let (expired, kept): (Vec<_>, Vec<_>) =
                    bucket.entries.drain(..).partition(|entry| entry.is_expired(now));
                bucket.entries = kept;
                batches.push((
                    bucket.opened,
                    key.clone(),
                    expired.into_iter().map(TimedEntry::into_value).collect::<Vec<_>>(),
                ));
            }
            !bucket.entries.is_empty()
        });
        batches.sort_unstable_by_key(|(opened, _, _)| *opened);
        batches.into_iter().map(|(_, key, values)| (key, values)).collect()
    }

    fn listeners(&self) -> Vec<ExpiryListener<K, V>> {
        self.listeners.snapshot()
    }

    fn reset(&mut self) {
        self.buckets.clear();
        self.listeners.clear();
    }
}

/// A one-to-many map whose values disappear once their lifespan ends.
///
/// Values under a key keep insertion order. Duplicates are allowed.
pub struct TimedMultimap<K, V> {
    shell: Arc<Shell<MultimapState<K, V>>>,
}

impl<K, V> Clone for TimedMultimap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shell: Arc::clone(&self.shell),
        }
    }
}

impl<K, V> TimedMultimap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create a multimap swept by `janitor`.
    #[must_use]
    pub fn new(janitor: &Janitor, default_lifespan: Lifespan) -> Self {
        Self::labelled(janitor, "timed-multimap", default_lifespan)
    }

    /// Like [`TimedMultimap::new`], with a name used in logs.
    #[must_use]
    pub fn labelled(janitor: &Janitor, label: impl Into<String>, default_lifespan: Lifespan) -> Self {
        let state = MultimapState {
            buckets: HashMap::new(),
            next_bucket: 0,
            listeners: ExpiryRegistry::new(),
        };
        Self {
            shell: Shell::register(janitor, label.into(), default_lifespan, state),
        }
    }

    /// Add a value under `key` with the default lifespan. Returns `false` once disposed.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.insert_for(key, value, self.shell.default_lifespan())
    }

    /// Add a value under `key` with an explicit lifespan. Returns `false` once disposed.
    pub fn insert_for(&self, key: K, value: V, lifespan: Lifespan) -> bool {
        self.shell
            .with(|state, now| state.push(key, TimedEntry::new(value, lifespan, now)))
            .is_some()
    }

    /// Add a value unless a live value under `key` conflicts with it.
    ///
    /// The check and the insert happen under one lock.
    ///
    /// # Errors
    /// Hands `value` back when `conflicts` matched a live value, or when the
    /// multimap was disposed.
    pub fn try_insert_for<F>(&self, key: K, value: V, lifespan: Lifespan, conflicts: F) -> Result<(), V>
    where
        F: Fn(&V) -> bool,
    {
        let mut value = Some(value);
        let inserted = self.shell.with(|state, now| {
            if state.live(&key, now).any(|entry| conflicts(entry.value())) {
                return false;
            }
            if let Some(value) = value.take() {
                state.push(key, TimedEntry::new(value, lifespan, now));
            }
            true
        });
        match (inserted, value) {
            (Some(true), _) | (_, None) => Ok(()),
            (_, Some(value)) => Err(value),
        }
    }

    /// Live values under `key` in insertion order.
    pub fn get(&self, key: &K) -> Vec<V> {
        self.shell
            .with(|state, now| state.live(key, now).map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }

    /// Whether `key` has at least one live value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.shell
            .with(|state, now| state.live(key, now).next().is_some())
            .unwrap_or(false)
    }

    /// Remove every live value under `key`. Fires no listener.
    pub fn remove(&self, key: &K) -> Vec<V> {
        self.remove_where(key, |_| true)
    }

    /// Remove live values under `key` matching `pred`. Fires no listener.
    pub fn remove_where<F>(&self, key: &K, pred: F) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
    {
        self.shell
            .with(|state, now| state.take_live(key, now, pred))
            .unwrap_or_default()
    }

    /// Total number of live values across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shell
            .with(|state, now| {
                state
                    .buckets
                    .values()
                    .flat_map(|bucket| &bucket.entries)
                    .filter(|e| !e.is_expired(now))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Whether there is no live value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with at least one live value.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.shell
            .with(|state, now| state.buckets.values().filter(|b| b.has_live(now)).count())
            .unwrap_or(0)
    }

    /// Keys with at least one live value, in the order they were first added.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.shell
            .with(|state, now| {
                state
                    .ordered()
                    .into_iter()
                    .filter(|(_, bucket)| bucket.has_live(now))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove every live value. Fires no listener.
    pub fn clear(&self) {
        self.shell.with(|state, now| {
            state.buckets.retain(|_, bucket| {
                bucket.entries.retain(|e| e.is_expired(now));
                !bucket.entries.is_empty()
            });
        });
    }

    /// Register a listener called with each key and the values that lapsed under it.
    pub fn on_lifespan_end<F>(&self, listener: F)
    where
        F: Fn(&K, &[V]) + Send + Sync + 'static,
    {
        self.shell.with(|state, _| state.listeners.subscribe(listener));
    }

    /// Lifespan used by [`TimedMultimap::insert`].
    #[must_use]
    pub fn default_lifespan(&self) -> Lifespan {
        self.shell.default_lifespan()
    }

    /// Name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        self.shell.label()
    }

    /// Drop every value and listener. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.shell.dispose()
    }

    /// Whether [`TimedMultimap::dispose`] was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shell.disposed()
    }

    /// A handle that does not keep the multimap alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakTimedMultimap<K, V> {
        WeakTimedMultimap {
            shell: Arc::downgrade(&self.shell),
        }
    }
}

/// Non-owning handle to a [`TimedMultimap`].
///
/// Values stored in a multimap can hold one of these to reach back into it
/// without a reference cycle.
pub struct WeakTimedMultimap<K, V> {
    shell: Weak<Shell<MultimapState<K, V>>>,
}

impl<K, V> Clone for WeakTimedMultimap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shell: Weak::clone(&self.shell),
        }
    }
}

impl<K, V> WeakTimedMultimap<K, V> {
    /// The multimap, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<TimedMultimap<K, V>> {
        self.shell.upgrade().map(|shell| TimedMultimap { shell })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, TimeUnit};
    use parking_lot::Mutex;

    fn setup() -> (ManualClock, Janitor) {
        let clock = ManualClock::new();
        let janitor = Janitor::new(clock.clone());
        (clock, janitor)
    }

    #[test]
    fn values_keep_insertion_order() {
        let (_, janitor) = setup();
        let mm = TimedMultimap::new(&janitor, Lifespan::Forever);
        mm.insert("k", 3);
        mm.insert("k", 1);
        mm.insert("k", 2);

        assert_eq!(mm.get(&"k"), vec![3, 1, 2]);
        assert_eq!(mm.len(), 3);
        assert_eq!(mm.key_count(), 1);
    }

    #[test]
    fn keys_follow_insertion_order() {
        let (clock, janitor) = setup();
        let mm = TimedMultimap::new(&janitor, Lifespan::Forever);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let order = Arc::clone(&order);
            mm.on_lifespan_end(move |k: &u32, _| order.lock().push(*k));
        }
        for key in [40, 7, 99, 3, 58, 12] {
            mm.insert_for(key, key, Lifespan::of(1, TimeUnit::Seconds));
        }
        mm.insert(7, 0);
        assert_eq!(mm.keys(), vec![40, 7, 99, 3, 58, 12]);

        mm.remove(&40);
        mm.insert(40, 1);
        assert_eq!(mm.keys(), vec![7, 99, 3, 58, 12, 40]);

        clock.advance_millis(1_000);
        janitor.sweep_now();
        assert_eq!(*order.lock(), vec![7, 99, 3, 58, 12]);
        assert_eq!(mm.keys(), vec![7, 40]);
        assert_eq!(mm.key_count(), 2);
    }

    #[test]
    fn sweep_batches_by_key() {
        let (clock, janitor) = setup();
        let mm = TimedMultimap::new(&janitor, Lifespan::of(1, TimeUnit::Seconds));
        let calls = Arc::new(Mutex::new(Vec::new()));
        {
            let calls = Arc::clone(&calls);
            mm.on_lifespan_end(move |k: &char, v: &[u8]| calls.lock().push((*k, v.to_vec())));
        }

        mm.insert('a', 1);
        mm.insert('a', 2);
        mm.insert('b', 3);
        mm.insert_for('b', 4, Lifespan::Forever);
        clock.advance_millis(1_000);
        let pass = janitor.sweep_now();

        assert_eq!(pass.expired, 3);
        let mut calls = calls.lock().clone();
        calls.sort();
        assert_eq!(calls, vec![('a', vec![1, 2]), ('b', vec![3])]);
        assert_eq!(mm.get(&'b'), vec![4]);
        assert!(!mm.contains_key(&'a'));
    }

    #[test]
    fn remove_leaves_expired_values_for_the_sweep() {
        let (clock, janitor) = setup();
        let mm = TimedMultimap::new(&janitor, Lifespan::Forever);
        let lapsed: Arc<Mutex<Vec<&str>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let lapsed = Arc::clone(&lapsed);
            mm.on_lifespan_end(move |_, v| lapsed.lock().extend_from_slice(v));
        }

        mm.insert_for(1, "old", Lifespan::of(1, TimeUnit::Seconds));
        mm.insert(1, "new");
        clock.advance_millis(1_000);

        assert_eq!(mm.remove(&1), vec!["new"]);
        janitor.sweep_now();
        assert_eq!(*lapsed.lock(), vec!["old"]);
    }

    #[test]
    fn remove_where_is_selective() {
        let (_, janitor) = setup();
        let mm = TimedMultimap::new(&janitor, Lifespan::Forever);
        for v in 1..=5 {
            mm.insert("k", v);
        }

        assert_eq!(mm.remove_where(&"k", |v| v % 2 == 0), vec![2, 4]);
        assert_eq!(mm.get(&"k"), vec![1, 3, 5]);
    }

    #[test]
    fn try_insert_rejects_conflicts() {
        let (_, janitor) = setup();
        let mm = TimedMultimap::new(&janitor, Lifespan::Forever);

        assert_eq!(mm.try_insert_for("p", "trade", Lifespan::Forever, |v| *v == "trade"), Ok(()));
        assert_eq!(
            mm.try_insert_for("p", "trade", Lifespan::Forever, |v| *v == "trade"),
            Err("trade")
        );
        assert_eq!(mm.try_insert_for("p", "duel", Lifespan::Forever, |v| *v == "duel"), Ok(()));
    }

    #[test]
    fn weak_handle_does_not_keep_alive() {
        let (_, janitor) = setup();
        let mm: TimedMultimap<u8, u8> = TimedMultimap::new(&janitor, Lifespan::Forever);
        let weak = mm.downgrade();

        assert!(weak.upgrade().is_some());
        drop(mm);
        assert!(weak.upgrade().is_none());
    }
}
