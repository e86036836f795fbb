//! Topic to callback registry.

use decibel_core::types::Topic;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Why a callback rejected a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallbackFailure {
    /// The callback itself reported an error.
    Failed(String),
    /// The payload did not match the expected shape.
    Decode(String),
}

/// Type-erased payload callback.
pub(crate) type Callback = Arc<dyn Fn(&Value) -> Result<(), CallbackFailure> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Entry {
    pub id: u64,
    pub active: Arc<AtomicBool>,
    pub callback: Callback,
}

/// Result of removing a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// No such callback was registered.
    NotFound,
    /// Removed; other callbacks remain on the topic.
    Removed,
    /// Removed the last callback; the topic is gone.
    TopicEmptied,
}

/// Callbacks per topic, in registration order.
///
/// A topic is present only while it has at least one callback.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    topics: BTreeMap<Topic, Vec<Entry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback. Returns true if the topic was not registered before.
    pub fn insert(&mut self, topic: Topic, entry: Entry) -> bool {
        let entries = self.topics.entry(topic).or_default();
        entries.push(entry);
        entries.len() == 1
    }

    pub fn remove(&mut self, topic: &Topic, id: u64) -> Removal {
        let Some(entries) = self.topics.get_mut(topic) else {
            return Removal::NotFound;
        };
        let Some(position) = entries.iter().position(|entry| entry.id == id) else {
            return Removal::NotFound;
        };

        let entry = entries.remove(position);
        entry.active.store(false, Ordering::Release);

        if entries.is_empty() {
            self.topics.remove(topic);
            Removal::TopicEmptied
        } else {
            Removal::Removed
        }
    }

    /// Copies the callbacks for a topic so they can run without the lock.
    pub fn snapshot(&self, topic: &Topic) -> Vec<Entry> {
        self.topics.get(topic).cloned().unwrap_or_default()
    }

    /// Registered topics in sorted order.
    pub fn topics(&self) -> Vec<Topic> {
        self.topics.keys().cloned().collect()
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Drops every callback and marks it inactive.
    pub fn clear(&mut self) {
        for entry in self.topics.values().flatten() {
            entry.active.store(false, Ordering::Release);
        }
        self.topics.clear();
    }
}
