//! Pipeline counters.
//! Shared between the ingestion task (writer) and the query surface (reader) via `Arc`.
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    lines_read: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    accepted: AtomicU64,
    evicted: AtomicU64,
    classifier_fallbacks: AtomicU64,
    delivered: AtomicU64,
    delivery_failed: AtomicU64,
    transport_errors: AtomicU64,
    transport_connected: AtomicBool,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_lines_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_classifier_fallbacks(&self) {
        self.classifier_fallbacks.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_delivery_failed(&self) {
        self.delivery_failed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_transport_connected(&self, connected: bool) {
        self.transport_connected.store(connected, Ordering::Relaxed);
    }

    pub fn transport_connected(&self) -> bool {
        self.transport_connected.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            classifier_fallbacks: self.classifier_fallbacks.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failed: self.delivery_failed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub lines_read: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub accepted: u64,
    pub evicted: u64,
    pub classifier_fallbacks: u64,
    pub delivered: u64,
    pub delivery_failed: u64,
    pub transport_errors: u64,
}
