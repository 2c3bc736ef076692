//! Player identity and the outbound chat queue requests talk through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use lapse_respond::MessageSink;

/// Unique identifier for a connected player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0.simple())
    }
}

/// Per-player queues of outgoing chat lines.
///
/// Only connected players receive messages. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    queues: Arc<Mutex<HashMap<PlayerId, Vec<String>>>>,
}

impl Outbox {
    /// Create an outbox with nobody connected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting messages for `player`.
    pub fn connect(&self, player: PlayerId) {
        self.queues.lock().entry(player).or_default();
    }

    /// Stop accepting messages for `player`, discarding anything undelivered.
    pub fn disconnect(&self, player: &PlayerId) -> usize {
        self.queues.lock().remove(player).map_or(0, |queue| queue.len())
    }

    /// Whether `player` is connected.
    #[must_use]
    pub fn is_connected(&self, player: &PlayerId) -> bool {
        self.queues.lock().contains_key(player)
    }

    /// Take every message queued for `player`, oldest first.
    pub fn drain(&self, player: &PlayerId) -> Vec<String> {
        self.queues
            .lock()
            .get_mut(player)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

impl MessageSink<PlayerId> for Outbox {
    fn send_to(&self, recipient: &PlayerId, text: &str) -> bool {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(recipient) else {
            return false;
        };
        queue.push(text.to_string());
        trace!(player = %recipient, "Message queued");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connected_players_receive() {
        let outbox = Outbox::new();
        let alice = PlayerId::new();
        let bob = PlayerId::new();
        outbox.connect(alice);

        assert!(outbox.send_to(&alice, "hello"));
        assert!(!outbox.send_to(&bob, "hello"));
        assert_eq!(outbox.drain(&alice), vec!["hello".to_string()]);
        assert!(outbox.drain(&alice).is_empty());
        assert!(outbox.drain(&bob).is_empty());
    }

    #[test]
    fn disconnect_discards_queue() {
        let outbox = Outbox::new();
        let alice = PlayerId::new();
        outbox.connect(alice);
        outbox.send_to(&alice, "one");
        outbox.send_to(&alice, "two");

        assert_eq!(outbox.disconnect(&alice), 2);
        assert!(!outbox.is_connected(&alice));
    }

    #[test]
    fn ids_are_distinct_and_printable() {
        let a = PlayerId::new();
        assert_ne!(a, PlayerId::new());
        assert!(a.to_string().starts_with("player-"));
    }
}
