//! Deadline-ordered index so a sweep only visits what is due.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::mem;
use std::time::Instant;

use crate::clock::Deadline;

/// Everything due at one instant, in insertion order.
///
/// Removal leaves a hole so positions stay valid; holes are dropped on drain.
struct Slot<T> {
    items: Vec<Option<T>>,
    positions: HashMap<T, usize>,
}

impl<T: Eq + Hash + Clone> Slot<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn push(&mut self, item: T) {
        if let Some(stale) = self.positions.insert(item.clone(), self.items.len()) {
            self.items[stale] = None;
        }
        self.items.push(Some(item));
    }

    fn take(&mut self, item: &T) {
        if let Some(pos) = self.positions.remove(item) {
            self.items[pos] = None;
        }
    }

    fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Items grouped by the instant they expire at. `Never` deadlines are not indexed.
///
/// An item is held at most once per instant.
pub(crate) struct ExpiryIndex<T> {
    slots: BTreeMap<Instant, Slot<T>>,
}

impl<T: Eq + Hash + Clone> ExpiryIndex<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, deadline: Deadline, item: T) {
        if let Deadline::At(at) = deadline {
            self.slots.entry(at).or_insert_with(Slot::new).push(item);
        }
    }

    pub(crate) fn remove(&mut self, deadline: Deadline, item: &T) {
        let Deadline::At(at) = deadline else {
            return;
        };
        let now_empty = match self.slots.get_mut(&at) {
            Some(slot) => {
                slot.take(item);
                slot.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.slots.remove(&at);
        }
    }

    /// Remove and return every item due at or before `now`, soonest first.
    pub(crate) fn drain_due(&mut self, now: Instant) -> Vec<(Instant, T)> {
        let later = self.slots.split_off(&now);
        let mut due = mem::replace(&mut self.slots, later);
        if let Some(slot) = self.slots.remove(&now) {
            due.insert(now, slot);
        }
        due.into_iter()
            .flat_map(|(at, slot)| slot.items.into_iter().flatten().map(move |item| (at, item)))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.values().map(|slot| slot.positions.len()).sum()
    }
}
