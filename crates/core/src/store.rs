use std::fmt;

use vizwire_protocol::{Recording, Viz};

/// What changed in a [`MessageStore`]. Sent to subscribers after the
/// mutation is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Appended { index: usize },
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreChange)>;

/// Append-only, in-memory log of the records received this session.
///
/// A record's index is its identity (full-screen routes address records by
/// index) and never changes until [`clear`](Self::clear) empties the log.
/// There is no capacity bound and no deduplication.
#[derive(Default)]
pub struct MessageStore {
    records: Vec<Viz>,
    revision: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_listener: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: Viz) {
        let index = self.records.len();
        self.records.push(record);
        self.bump(StoreChange::Appended { index });
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.bump(StoreChange::Cleared);
    }

    /// The record at `index`, or `None` when `index` is outside the current
    /// bounds.
    pub fn get(&self, index: usize) -> Option<&Viz> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Viz] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Viz> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&Viz> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Incremented on every append and clear.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Snapshot the current records as a replayable recording.
    pub fn to_recording(
        &self,
        name: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Recording {
        let mut recording = Recording::new(name, session_id);
        recording.vizs = self.records.clone();
        recording
    }

    fn bump(&mut self, change: StoreChange) {
        self.revision += 1;
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
    }
}

impl fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStore")
            .field("len", &self.records.len())
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a MessageStore {
    type Item = &'a Viz;
    type IntoIter = std::slice::Iter<'a, Viz>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
