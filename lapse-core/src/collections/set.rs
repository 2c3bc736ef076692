//! Timed set, a thin layer over [`TimedMap`] with unit values.

use std::hash::Hash;

use crate::clock::Lifespan;
use crate::janitor::Janitor;

use super::map::TimedMap;

/// A set whose elements disappear once their lifespan ends.
///
/// Re-inserting an element that is still present restarts its lifespan.
pub struct TimedSet<T> {
    inner: TimedMap<T, ()>,
}

impl<T> Clone for TimedSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> TimedSet<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    /// Create a set swept by `janitor`.
    #[must_use]
    pub fn new(janitor: &Janitor, default_lifespan: Lifespan) -> Self {
        Self::labelled(janitor, "timed-set", default_lifespan)
    }

    /// Like [`TimedSet::new`], with a name used in logs.
    #[must_use]
    pub fn labelled(janitor: &Janitor, label: impl Into<String>, default_lifespan: Lifespan) -> Self {
        Self {
            inner: TimedMap::labelled(janitor, label, default_lifespan),
        }
    }

    /// Add with the default lifespan. Returns `true` if the element was not present.
    pub fn insert(&self, element: T) -> bool {
        self.inner.insert(element, ()).is_none()
    }

    /// Add with an explicit lifespan. Returns `true` if the element was not present.
    pub fn insert_for(&self, element: T, lifespan: Lifespan) -> bool {
        self.inner.insert_for(element, (), lifespan).is_none()
    }

    /// Whether `element` is present and live.
    pub fn contains(&self, element: &T) -> bool {
        self.inner.get(element).is_some()
    }

    /// Remove `element`. Returns `true` if it was present. Fires no listener.
    pub fn remove(&self, element: &T) -> bool {
        self.inner.remove(element).is_some()
    }

    /// Time left for `element`, `None` when absent.
    pub fn time_left(&self, element: &T) -> Option<Lifespan> {
        self.inner.time_left(element)
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether there is no live element.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of live elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.keys()
    }

    /// Keep only live elements for which `keep` returns `true`.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.retain(|element, _| keep(element));
    }

    /// Remove every element. Fires no listener.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Register a listener called with each element whose lifespan ended.
    pub fn on_lifespan_end<F>(&self, listener: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.on_lifespan_end(move |element, _| listener(element));
    }

    /// Lifespan used by [`TimedSet::insert`].
    #[must_use]
    pub fn default_lifespan(&self) -> Lifespan {
        self.inner.default_lifespan()
    }

    /// Name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        self.inner.label()
    }

    /// Drop every element and listener. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.inner.dispose()
    }

    /// Whether [`TimedSet::dispose`] was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}
