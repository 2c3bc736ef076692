//! Lifespan-end subscribers.
//!
//! Each container keeps an [`ExpiryRegistry`] under the same lock as its
//! entries. A sweep copies the listener list, releases the lock, then calls
//! every listener once per key with the batch of values that expired under
//! that key. Listeners may therefore re-enter the container.
//!
//! A listener that panics is caught and logged; the remaining listeners and
//! the remaining keys are still notified.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

/// Callback invoked with a key and the values that expired under it.
pub type ExpiryListener<K, V> = Arc<dyn Fn(&K, &[V]) + Send + Sync>;

/// Ordered list of lifespan-end listeners for one container.
pub struct ExpiryRegistry<K, V> {
    listeners: Vec<ExpiryListener<K, V>>,
}

impl<K, V> ExpiryRegistry<K, V> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Append a listener. Listeners run in registration order.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&K, &[V]) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Copy of the listener list, safe to use after the container lock is released.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExpiryListener<K, V>> {
        self.listeners.clone()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<K, V> Default for ExpiryRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver expired batches to listeners.
///
/// Returns the number of listener invocations that panicked.
pub fn notify<K, V>(label: &str, listeners: &[ExpiryListener<K, V>], batches: &[(K, Vec<V>)]) -> usize {
    let mut panics = 0;
    for (key, values) in batches {
        for listener in listeners {
            if !call_isolated(label, || listener(key, values)) {
                panics += 1;
            }
        }
    }
    panics
}

/// Run `f`, catching a panic instead of unwinding into the caller.
///
/// Returns `false` when `f` panicked.
pub fn call_isolated<F: FnOnce()>(label: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(listener = %label, %reason, "Listener panicked; continuing");
            false
        }
    }
}
