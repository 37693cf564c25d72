//! Bounded, arrival-ordered buffer of accepted messages.
//!
//! The store is the only shared mutable state in the service. The ingestion pipeline
//! holds the single [`StoreWriter`]; the query surface and anything else that wants to
//! look at recent traffic holds a cloneable [`StoreReader`] and works on snapshots.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::message::{Message, NodeId};

pub const DEFAULT_CAPACITY: usize = 200;

/// Fixed-capacity FIFO. Appending to a full store evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct MessageStore {
    capacity: usize,
    entries: VecDeque<Message>,
}

impl MessageStore {
    /// Capacity is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `msg`, returning the evicted entry when the store was full.
    pub fn append(&mut self, msg: Message) -> Option<Message> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(msg);
        evicted
    }

    pub fn contains(&self, source_node: &NodeId, message_id: &str) -> bool {
        self.entries
            .iter()
            .any(|m| m.source_node() == source_node && m.message_id() == message_id)
    }

    /// Like [`contains`](Self::contains) but also requires the same relaying node.
    pub fn contains_route(
        &self,
        source_node: &NodeId,
        current_node: &NodeId,
        message_id: &str,
    ) -> bool {
        self.entries.iter().any(|m| {
            m.source_node() == source_node
                && m.current_node() == current_node
                && m.message_id() == message_id
        })
    }

    /// Oldest first.
    pub fn all(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }

    /// Newest first, for feed style views.
    pub fn newest_first(&self) -> Vec<Message> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Create a store and split it into its single writer and a reader handle.
pub fn shared(capacity: usize) -> (StoreWriter, StoreReader) {
    let inner = Arc::new(RwLock::new(MessageStore::new(capacity)));
    (
        StoreWriter {
            inner: inner.clone(),
        },
        StoreReader { inner },
    )
}

/// Exclusive write handle. Not `Clone`: exactly one writer exists per store.
#[derive(Debug)]
pub struct StoreWriter {
    inner: Arc<RwLock<MessageStore>>,
}

impl StoreWriter {
    pub fn append(&self, msg: Message) -> Option<Message> {
        self.write().append(msg)
    }

    /// Run `f` against the current contents without cloning them.
    pub fn inspect<R>(&self, f: impl FnOnce(&MessageStore) -> R) -> R {
        f(&self.read())
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            inner: self.inner.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MessageStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MessageStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only handle; every accessor returns a consistent snapshot.
#[derive(Debug, Clone)]
pub struct StoreReader {
    inner: Arc<RwLock<MessageStore>>,
}

impl StoreReader {
    pub fn snapshot(&self) -> Vec<Message> {
        self.read().all()
    }

    pub fn newest_first(&self) -> Vec<Message> {
        self.read().newest_first()
    }

    pub fn contains(&self, source_node: &NodeId, message_id: &str) -> bool {
        self.read().contains(source_node, message_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    fn read(&self) -> RwLockReadGuard<'_, MessageStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
