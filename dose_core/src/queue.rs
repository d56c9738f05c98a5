//! Pending reminder notifications.
//!
//! Entries are keyed by medicine id and overwritten on every scan that finds
//! the dose due. A consumer takes a snapshot, delivers, then acks. If the
//! consumer has not acked by the next scan, it will see the same message again.

use crate::MedicineId;
use dashmap::DashMap;
use std::collections::HashMap;

/// Concurrent map of medicine id to reminder text
///
/// Backed by a sharded map, so writers for different medicines do not contend
/// on a single lock.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: DashMap<MedicineId, String>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `id`; last writer wins
    pub fn put(&self, id: MedicineId, message: impl Into<String>) {
        self.pending.insert(id, message.into());
    }

    /// Copy of all pending entries; nothing is removed
    pub fn snapshot(&self) -> HashMap<MedicineId, String> {
        self.pending
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Remove the entry for `id`, returning the message if one was pending
    pub fn ack(&self, id: MedicineId) -> Option<String> {
        self.pending.remove(&id).map(|(_, message)| message)
    }

    pub fn get(&self, id: MedicineId) -> Option<String> {
        self.pending.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&self) {
        self.pending.clear();
    }
}
