use crossbeam_channel::{Receiver, Sender};

use crate::error::InventoryResult;
use crate::record::{RawFields, RawSnapshot};

/// Keyed record store the view-model is synchronized from.
///
/// Implementations push a full snapshot to every subscription right away and
/// again after each change. Errors are returned to the caller, never retried.
pub trait PersistenceBackend {
    fn subscribe(&mut self) -> InventoryResult<Subscription>;

    /// Stores a new record and returns its id.
    fn create(&mut self, fields: RawFields) -> InventoryResult<String>;

    /// Merges `fields` into the stored record.
    fn update(&mut self, id: &str, fields: RawFields) -> InventoryResult<()>;

    fn remove(&mut self, id: &str) -> InventoryResult<()>;
}

/// Single-consumer end of a snapshot feed. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<RawSnapshot>,
}

impl Subscription {
    /// Newest queued snapshot, discarding older ones. `None` when nothing is queued.
    pub fn latest(&self) -> Option<RawSnapshot> {
        self.receiver.try_iter().last()
    }
}

/// Producer-side registry of live subscriptions.
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Sender<RawSnapshot>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a feed primed with `current`.
    pub fn open(&mut self, current: &RawSnapshot) -> Subscription {
        let (sender, receiver) = crossbeam_channel::unbounded();
        // The receiver is alive here, so this send cannot fail.
        let _ = sender.send(current.clone());
        self.senders.push(sender);
        Subscription { receiver }
    }

    /// Sends `snapshot` to every live feed and forgets the dropped ones.
    pub fn broadcast(&mut self, snapshot: &RawSnapshot) {
        self.senders
            .retain(|sender| sender.send(snapshot.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn snapshot_with(name: &str) -> RawSnapshot {
        let mut map = Map::new();
        map.insert("a".to_string(), json!({ "name": name }));
        map
    }

    #[test]
    fn open_primes_with_current_state() {
        let mut subscribers = Subscribers::new();
        let feed = subscribers.open(&snapshot_with("first"));
        assert_eq!(feed.latest(), Some(snapshot_with("first")));
        assert_eq!(feed.latest(), None);
    }

    #[test]
    fn latest_keeps_only_newest() {
        let mut subscribers = Subscribers::new();
        let feed = subscribers.open(&snapshot_with("first"));
        subscribers.broadcast(&snapshot_with("second"));
        subscribers.broadcast(&snapshot_with("third"));
        assert_eq!(feed.latest(), Some(snapshot_with("third")));
    }

    #[test]
    fn dropped_feeds_are_pruned() {
        let mut subscribers = Subscribers::new();
        let kept = subscribers.open(&Map::new());
        drop(subscribers.open(&Map::new()));
        subscribers.broadcast(&snapshot_with("x"));
        assert_eq!(subscribers.len(), 1);
        assert!(kept.latest().is_some());
    }
}
