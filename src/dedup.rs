//! Duplicate detection against the bounded store.
//!
//! Meshes rebroadcast frames, so the same message routinely arrives more than once,
//! sometimes via different relay nodes. Whether a copy heard through another relay
//! counts as a duplicate is a deployment decision; see [`DedupScope`].

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::store::MessageStore;

/// Which fields identify a message for duplicate detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// `(source_node, message_id)`; copies relayed by any node are duplicates.
    #[default]
    Source,
    /// `(source_node, current_node, message_id)`; a copy via a different relay is new.
    Route,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    scope: DedupScope,
}

impl Deduplicator {
    pub fn new(scope: DedupScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> DedupScope {
        self.scope
    }

    /// True when `msg` is already in the store's window.
    ///
    /// Only the window counts: a key that has been evicted is accepted again.
    pub fn is_duplicate(&self, store: &MessageStore, msg: &Message) -> bool {
        match self.scope {
            DedupScope::Source => store.contains(msg.source_node(), msg.message_id()),
            DedupScope::Route => {
                store.contains_route(msg.source_node(), msg.current_node(), msg.message_id())
            }
        }
    }
}
