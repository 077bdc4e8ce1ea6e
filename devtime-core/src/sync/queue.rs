use std::collections::VecDeque;

use crate::models::QueuedUpdate;

/// FIFO buffer of undelivered deltas.
///
/// Unbounded and in memory. Items are never merged or deduplicated: two deltas
/// for the same day are delivered independently, which is safe because the
/// merge is additive.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    items: VecDeque<QueuedUpdate>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, item: QueuedUpdate) {
        self.items.push_back(item);
    }

    /// Snapshot-and-clear: hands over every queued item in enqueue order and
    /// leaves the queue empty, so anything enqueued while the snapshot is
    /// being delivered lands in a fresh batch.
    pub fn take_all(&mut self) -> Vec<QueuedUpdate> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<QueuedUpdate>> for OfflineQueue {
    fn from(items: Vec<QueuedUpdate>) -> Self {
        Self {
            items: items.into(),
        }
    }
}
