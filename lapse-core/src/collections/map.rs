//! Timed key → value map.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use crate::clock::{Deadline, Lifespan};
use crate::entry::TimedEntry;
use crate::janitor::Janitor;
use crate::subscriber::{ExpiryListener, ExpiryRegistry};

use super::index::ExpiryIndex;
use super::{Backing, Shell};

pub(crate) struct MapState<K, V> {
    entries: HashMap<K, TimedEntry<V>>,
    index: ExpiryIndex<K>,
    /// Expired entries pulled out early (replaced or read after their
    /// deadline) that the next sweep still has to report.
    overdue: Vec<(K, V)>,
    listeners: ExpiryRegistry<K, V>,
}

impl<K, V> MapState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            index: ExpiryIndex::new(),
            overdue: Vec::new(),
            listeners: ExpiryRegistry::new(),
        }
    }

    fn live(&self, key: &K, now: Instant) -> Option<&TimedEntry<V>> {
        self.entries.get(key).filter(|entry| !entry.is_expired(now))
    }

    fn unlink(&mut self, key: &K) -> Option<TimedEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.index.remove(entry.expires_at(), key);
        Some(entry)
    }

    /// Take an expired entry out of the map. It is kept for the next sweep
    /// only when someone is listening.
    fn retire(&mut self, key: K, entry: TimedEntry<V>) {
        if !self.listeners.is_empty() {
            self.overdue.push((key, entry.into_value()));
        }
    }

    fn put(&mut self, key: K, value: V, lifespan: Lifespan, now: Instant) -> Option<V> {
        let previous = self.unlink(&key).and_then(|old| {
            if old.is_expired(now) {
                self.retire(key.clone(), old);
                None
            } else {
                Some(old.into_value())
            }
        });
        let entry = TimedEntry::new(value, lifespan, now);
        self.index.insert(entry.expires_at(), key.clone());
        self.entries.insert(key, entry);
        previous
    }

    fn remove_live(&mut self, key: &K, now: Instant) -> Option<V> {
        if self.live(key, now).is_some() {
            self.unlink(key).map(TimedEntry::into_value)
        } else {
            None
        }
    }
}

impl<K, V> Backing for MapState<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    type Key = K;
    type Value = V;

    fn take_expired(&mut self, now: Instant) -> Vec<(K, Vec<V>)> {
        let mut batches: Vec<(K, Vec<V>)> = Vec::new();
        let mut batch_of: HashMap<K, usize> = HashMap::new();
        let mut collect = |key: K, value: V| match batch_of.get(&key) {
            Some(&pos) => batches[pos].1.push(value),
            None => {
                batch_of.insert(key.clone(), batches.len());
                batches.push((key, vec![value]));
            }
        };

        for (key, value) in self.overdue.drain(..) {
            collect(key, value);
        }
        for (at, key) in self.index.drain_due(now) {
            let due = self
                .entries
                .get(&key)
                .is_some_and(|entry| entry.expires_at() == Deadline::At(at));
            if !due {
                continue;
            }
            if let Some(entry) = self.entries.remove(&key) {
                collect(key, entry.into_value());
            }
        }
        batches
    }

    fn listeners(&self) -> Vec<ExpiryListener<K, V>> {
        self.listeners.snapshot()
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.overdue.clear();
        self.listeners.clear();
    }
}

/// A map whose entries disappear once their lifespan ends.
///
/// Cloning the map clones the handle; all clones share the same entries.
///
/// ```rust
/// use lapse_core::{Janitor, Lifespan, ManualClock, TimeUnit, TimedMap};
///
/// let clock = ManualClock::new();
/// let janitor = Janitor::new(clock.clone());
/// let cooldowns = TimedMap::new(&janitor, Lifespan::of(3, TimeUnit::Seconds));
///
/// cooldowns.insert("steve", "fireball");
/// assert_eq!(cooldowns.get(&"steve"), Some("fireball"));
///
/// clock.advance_millis(3_000);
/// assert_eq!(cooldowns.get(&"steve"), None);
/// ```
pub struct TimedMap<K, V> {
    shell: Arc<Shell<MapState<K, V>>>,
}

impl<K, V> Clone for TimedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shell: Arc::clone(&self.shell),
        }
    }
}

impl<K, V> TimedMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create a map swept by `janitor`, storing entries for `default_lifespan`
    /// unless told otherwise.
    #[must_use]
    pub fn new(janitor: &Janitor, default_lifespan: Lifespan) -> Self {
        Self::labelled(janitor, "timed-map", default_lifespan)
    }

    /// Like [`TimedMap::new`], with a name used in logs.
    #[must_use]
    pub fn labelled(janitor: &Janitor, label: impl Into<String>, default_lifespan: Lifespan) -> Self {
        Self {
            shell: Shell::register(janitor, label.into(), default_lifespan, MapState::new()),
        }
    }

    /// Insert with the default lifespan. Returns the previous live value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.insert_for(key, value, self.shell.default_lifespan())
    }

    /// Insert with an explicit lifespan. Returns the previous live value.
    pub fn insert_for(&self, key: K, value: V, lifespan: Lifespan) -> Option<V> {
        self.shell
            .with(|state, now| state.put(key, value, lifespan, now))
            .flatten()
    }

    /// The live value for `key`.
    ///
    /// An entry found past its deadline is taken out of the map on the spot.
    pub fn get(&self, key: &K) -> Option<V> {
        self.shell
            .with(|state, now| {
                let expired = state.entries.get(key)?.is_expired(now);
                if !expired {
                    return state.entries.get(key).map(|entry| entry.value().clone());
                }
                if let Some(old) = state.unlink(key) {
                    state.retire(key.clone(), old);
                }
                None
            })
            .flatten()
    }

    /// Whether `key` has a live value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.shell
            .with(|state, now| state.live(key, now).is_some())
            .unwrap_or(false)
    }

    /// Time left for `key`: `Finite(remaining)`, `Forever`, or `None` when absent.
    pub fn time_left(&self, key: &K) -> Option<Lifespan> {
        self.shell
            .with(|state, now| {
                state.live(key, now).map(|entry| match entry.remaining(now) {
                    Some(left) => Lifespan::Finite(left),
                    None => Lifespan::Forever,
                })
            })
            .flatten()
    }

    /// Remove `key`. Fires no lifespan-end listener.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.shell
            .with(|state, now| state.remove_live(key, now))
            .flatten()
    }

    /// Keep only the live entries for which `keep` returns `true`.
    ///
    /// Removed entries are explicit removals and fire no listener.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.shell.with(|state, now| {
            let doomed: Vec<K> = state
                .entries
                .iter()
                .filter(|(k, entry)| !entry.is_expired(now) && !keep(k, entry.value()))
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                state.unlink(&key);
            }
        });
    }

    /// Remove every live entry. Fires no listener.
    pub fn clear(&self) {
        self.retain(|_, _| false);
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shell
            .with(|state, now| state.entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// Whether there is no live entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live keys.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Snapshot of live values.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Snapshot of live key/value pairs.
    #[must_use]
    pub fn entries(&self) -> Vec<(K, V)> {
        self.shell
            .with(|state, now| {
                state
                    .entries
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired(now))
                    .map(|(k, entry)| (k.clone(), entry.value().clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Register a listener called with each key whose lifespan ended and
    /// the value it held.
    pub fn on_lifespan_end<F>(&self, listener: F)
    where
        F: Fn(&K, &[V]) + Send + Sync + 'static,
    {
        self.shell.with(|state, _| state.listeners.subscribe(listener));
    }

    /// Lifespan used by [`TimedMap::insert`].
    #[must_use]
    pub fn default_lifespan(&self) -> Lifespan {
        self.shell.default_lifespan()
    }

    /// Name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        self.shell.label()
    }

    /// Drop every entry and listener and stop being swept.
    ///
    /// Later operations are no-ops. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.shell.dispose()
    }

    /// Whether [`TimedMap::dispose`] was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shell.disposed()
    }
}
