use std::fmt;
use std::future::{self, Future};

use uuid::Uuid;

use crate::merge::merge;
use crate::models::{DayRecord, DeltaRecord, QueuedUpdate};
use crate::store::{RemoteStore, StoreError};

use super::queue::OfflineQueue;

/// What happened to a submitted delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Merged into the remote record.
    Success,
    /// Kept in the offline queue for a later drain.
    Queued,
    /// Rejected permanently; the delta was dropped.
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "synced"),
            Outcome::Queued => write!(f, "queued"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

/// Counts from one pass over the offline queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub failed: usize,
}

impl DrainReport {
    fn record(&mut self, outcome: Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Success => self.delivered += 1,
            Outcome::Queued => self.requeued += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Delivers deltas to a remote store, buffering them while it is unreachable.
///
/// Owns the offline queue. `submit` and `drain_all` take `&mut self`, so one
/// coordinator never runs two read-merge-write sequences at once. Nothing
/// guards against a second coordinator (or process) writing the same day.
pub struct SyncCoordinator<S> {
    store: S,
    queue: OfflineQueue,
    connected: bool,
}

impl<S: RemoteStore> SyncCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self::with_pending(store, Vec::new())
    }

    /// Creates a coordinator whose queue starts with previously undelivered
    /// updates, oldest first.
    pub fn with_pending(store: S, pending: Vec<QueuedUpdate>) -> Self {
        Self {
            store,
            queue: OfflineQueue::from(pending),
            connected: false,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of updates waiting for delivery.
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Connects to the store and drains the queue.
    ///
    /// On failure the coordinator stays (or becomes) not ready and every
    /// submit is queued without a remote call.
    pub async fn connect(&mut self) -> Result<DrainReport, StoreError> {
        self.connect_with(|_| future::ready(())).await
    }

    /// Like [`SyncCoordinator::connect`], calling `on_settled` for each
    /// drained item as soon as it is delivered or rejected.
    pub async fn connect_with<F, Fut>(&mut self, on_settled: F) -> Result<DrainReport, StoreError>
    where
        F: FnMut(Uuid) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let Err(e) = self.store.connect().await {
            self.connected = false;
            tracing::warn!(error = %e, pending = self.queue.len(), "Sync store unavailable");
            return Err(e);
        }

        self.connected = true;
        tracing::info!(pending = self.queue.len(), "Connected to sync store");
        Ok(self.drain_with(on_settled).await)
    }

    /// Marks the backend connection as lost.
    pub fn disconnect(&mut self) {
        if self.connected {
            tracing::info!("Sync store disconnected");
        }
        self.connected = false;
    }

    /// Delivers one delta for `user_id`.
    pub async fn submit(&mut self, user_id: &str, delta: DeltaRecord) -> Outcome {
        self.deliver(QueuedUpdate::new(user_id, delta)).await
    }

    /// Attempts delivery of every queued update.
    ///
    /// The queue is snapshotted and cleared first; each item then goes through
    /// the normal submit path, so an item that fails again is requeued into
    /// the fresh queue and is not retried again in this pass.
    pub async fn drain_all(&mut self) -> DrainReport {
        self.drain_with(|_| future::ready(())).await
    }

    /// Drains like [`SyncCoordinator::drain_all`]. `on_settled` receives the
    /// id of every item that left the queue for good (delivered or
    /// rejected), before the next item is attempted.
    pub async fn drain_with<F, Fut>(&mut self, mut on_settled: F) -> DrainReport
    where
        F: FnMut(Uuid) -> Fut,
        Fut: Future<Output = ()>,
    {
        let batch = self.queue.take_all();
        let mut report = DrainReport::default();
        if batch.is_empty() {
            return report;
        }

        tracing::debug!(count = batch.len(), "Draining offline queue");
        for item in batch {
            let id = item.id;
            let outcome = self.deliver(item).await;
            report.record(outcome);
            if outcome != Outcome::Queued {
                on_settled(id).await;
            }
        }

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            requeued = report.requeued,
            failed = report.failed,
            "Drained offline queue"
        );
        report
    }

    /// Final flush before exit: drains once if connected, releases the store
    /// and hands back whatever is still undelivered.
    pub async fn shutdown(self) -> Vec<QueuedUpdate> {
        self.shutdown_with(|_| future::ready(())).await
    }

    /// Like [`SyncCoordinator::shutdown`], reporting settled items of the
    /// final drain to `on_settled`.
    pub async fn shutdown_with<F, Fut>(mut self, on_settled: F) -> Vec<QueuedUpdate>
    where
        F: FnMut(Uuid) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.connected {
            self.drain_with(on_settled).await;
        }
        self.store.close().await;
        self.connected = false;

        let leftover = self.queue.take_all();
        if !leftover.is_empty() {
            tracing::warn!(count = leftover.len(), "Shutting down with undelivered updates");
        }
        leftover
    }

    async fn deliver(&mut self, mut item: QueuedUpdate) -> Outcome {
        if !self.connected {
            tracing::debug!(user_id = %item.user_id, date = %item.date(), "Store not ready, queueing");
            self.queue.enqueue(item);
            return Outcome::Queued;
        }

        match self.apply(&item.user_id, &item.delta).await {
            Ok(record) => {
                tracing::debug!(
                    user_id = %record.user_id,
                    date = %record.date,
                    total_seconds = record.total_seconds,
                    "Synced delta"
                );
                Outcome::Success
            }
            Err(e) if e.is_transient() => {
                item.attempts += 1;
                tracing::warn!(
                    user_id = %item.user_id,
                    date = %item.date(),
                    attempts = item.attempts,
                    error = %e,
                    "Transient sync failure, queueing"
                );
                self.queue.enqueue(item);
                Outcome::Queued
            }
            Err(e) => {
                tracing::error!(
                    user_id = %item.user_id,
                    date = %item.date(),
                    seconds = item.delta.total_seconds,
                    error = %e,
                    "Sync rejected, dropping delta"
                );
                Outcome::Failed
            }
        }
    }

    /// Read-merge-write, or one atomic increment where the store has it.
    async fn apply(&self, user_id: &str, delta: &DeltaRecord) -> Result<DayRecord, StoreError> {
        if self.store.supports_increment() {
            return self.store.increment(user_id, delta).await;
        }

        let existing = self.store.read(user_id, &delta.date).await?;
        let merged = merge(user_id, existing, delta);
        self.store.write(&merged).await?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const DAY: &str = "2024-01-01";

    fn delta(languages: &[(&str, u64)]) -> DeltaRecord {
        languages
            .iter()
            .fold(DeltaRecord::new(DAY), |d, (language, seconds)| {
                d.with_language(*language, *seconds)
            })
    }

    async fn connected(store: &MemoryStore) -> SyncCoordinator<MemoryStore> {
        let mut coordinator = SyncCoordinator::new(store.clone());
        coordinator.connect().await.unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_submit_to_empty_store_stores_delta() {
        let store = MemoryStore::new();
        let mut coordinator = connected(&store).await;
        let d = delta(&[("go", 120)]);

        let outcome = coordinator.submit("user1", d.clone()).await;

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(store.get("user1", DAY), Some(d.into_day_record("user1")));
    }

    #[tokio::test]
    async fn test_submit_merges_with_existing_record() {
        let store = MemoryStore::new();
        store.insert(DayRecord::new("user1", DAY).with_language("go", 120));
        let mut coordinator = connected(&store).await;

        let outcome = coordinator
            .submit("user1", delta(&[("go", 10), ("rust", 20)]))
            .await;

        assert_eq!(outcome, Outcome::Success);
        let record = store.get("user1", DAY).unwrap();
        assert_eq!(record.total_seconds, 150);
        assert_eq!(record.languages["go"], 130);
        assert_eq!(record.languages["rust"], 20);
    }

    #[tokio::test]
    async fn test_not_ready_queues_without_remote_call() {
        let store = MemoryStore::new();
        let mut coordinator = SyncCoordinator::new(store.clone());

        let outcome = coordinator.submit("user1", delta(&[("go", 5)])).await;

        assert_eq!(outcome, Outcome::Queued);
        assert_eq!(coordinator.pending_len(), 1);
        assert_eq!(store.read_count(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_write_failure_queues_original_delta() {
        let store = MemoryStore::new();
        store.insert(DayRecord::new("user1", DAY).with_language("go", 100));
        let mut coordinator = connected(&store).await;
        store.fail_next_write(StoreError::from_message("write ETIMEDOUT"));
        let before = store.get("user1", DAY);

        let outcome = coordinator.submit("user1", delta(&[("go", 5)])).await;

        assert_eq!(outcome, Outcome::Queued);
        assert_eq!(coordinator.pending_len(), 1);
        assert_eq!(store.get("user1", DAY), before);

        // The queued item is the delta, not the merged record.
        let pending = coordinator.queue.take_all();
        assert_eq!(pending[0].delta, delta(&[("go", 5)]));
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_read_failure_queues() {
        let store = MemoryStore::new();
        let mut coordinator = connected(&store).await;
        store.fail_next_read(StoreError::from_message("getaddrinfo ENOTFOUND host"));

        let outcome = coordinator.submit("user1", delta(&[("go", 5)])).await;

        assert_eq!(outcome, Outcome::Queued);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_queued() {
        let store = MemoryStore::new();
        let mut coordinator = connected(&store).await;
        store.fail_next_write(StoreError::from_message(
            "invalid argument: totalSeconds must be an integer",
        ));

        let outcome = coordinator.submit("user1", delta(&[("go", 5)])).await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(coordinator.pending_len(), 0);
        assert!(store.get("user1", DAY).is_none());
    }

    #[tokio::test]
    async fn test_identical_submits_double_count() {
        let store = MemoryStore::new();
        let mut coordinator = connected(&store).await;
        let d = delta(&[("go", 60)]);

        coordinator.submit("user1", d.clone()).await;
        coordinator.submit("user1", d).await;

        let record = store.get("user1", DAY).unwrap();
        assert_eq!(record.total_seconds, 120);
        assert_eq!(record.languages["go"], 120);
    }

    #[tokio::test]
    async fn test_drain_delivers_everything() {
        let store = MemoryStore::new();
        let mut coordinator = SyncCoordinator::new(store.clone());
        for seconds in [10, 20, 30] {
            coordinator.submit("user1", delta(&[("go", seconds)])).await;
        }
        assert_eq!(coordinator.pending_len(), 3);

        let report = coordinator.connect().await.unwrap();

        assert_eq!(coordinator.pending_len(), 0);
        assert_eq!(
            report,
            DrainReport {
                attempted: 3,
                delivered: 3,
                requeued: 0,
                failed: 0,
            }
        );
        assert_eq!(store.get("user1", DAY).unwrap().total_seconds, 60);
    }

    #[tokio::test]
    async fn test_drain_requeues_only_the_failed_item() {
        let store = MemoryStore::new();
        let mut coordinator = SyncCoordinator::new(store.clone());
        let a = DeltaRecord::new("2024-01-01").with_language("go", 10);
        let b = DeltaRecord::new("2024-01-02").with_language("go", 20);
        coordinator.submit("user1", a).await;
        coordinator.submit("user1", b.clone()).await;
        store.fail_day("user1", "2024-01-02", StoreError::transient("ECONNRESET"));

        let report = coordinator.connect().await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.requeued, 1);
        let remaining = coordinator.queue.take_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].delta, b);
        // Requeued into the fresh queue, not retried again in the same pass.
        assert_eq!(store.read_count(), 2);
        assert_eq!(store.get("user1", "2024-01-01").unwrap().total_seconds, 10);
    }

    #[tokio::test]
    async fn test_requeued_item_keeps_identity() {
        let store = MemoryStore::new();
        let mut coordinator = SyncCoordinator::new(store.clone());
        coordinator.submit("user1", delta(&[("go", 10)])).await;
        let original = coordinator.queue.take_all().remove(0);
        coordinator.queue.enqueue(original.clone());
        store.fail_day("user1", DAY, StoreError::transient("socket hang up"));

        coordinator.connect().await.unwrap();
        coordinator.drain_all().await;

        let remaining = coordinator.queue.take_all();
        assert_eq!(remaining[0].id, original.id);
        assert_eq!(remaining[0].queued_at, original.queued_at);
        assert_eq!(remaining[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_drain_drops_permanently_rejected_items() {
        let store = MemoryStore::new();
        let mut coordinator = SyncCoordinator::new(store.clone());
        coordinator.submit("user1", delta(&[("go", 10)])).await;
        store.fail_day("user1", DAY, StoreError::permanent("permission denied"));

        let report = coordinator.connect().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_connect_stays_not_ready() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let mut coordinator = SyncCoordinator::new(store.clone());

        assert!(coordinator.connect().await.is_err());
        assert!(!coordinator.is_connected());
        assert_eq!(store.connect_count(), 1);

        coordinator.submit("user1", delta(&[("go", 10)])).await;
        assert_eq!(store.read_count(), 0);
        assert_eq!(coordinator.pending_len(), 1);

        store.set_offline(false);
        coordinator.connect().await.unwrap();
        assert_eq!(store.connect_count(), 2);
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_drain_reports_settled_items_only() {
        let store = MemoryStore::new();
        let restored: Vec<QueuedUpdate> = ["2024-01-01", "2024-01-02", "2024-01-03"]
            .into_iter()
            .map(|date| QueuedUpdate::new("user1", DeltaRecord::new(date).with_language("go", 10)))
            .collect();
        let queued: Vec<Uuid> = restored.iter().map(|item| item.id).collect();
        let mut coordinator = SyncCoordinator::with_pending(store.clone(), restored);
        store.fail_day("user1", "2024-01-02", StoreError::transient("ETIMEDOUT"));
        store.fail_day("user1", "2024-01-03", StoreError::permanent("forbidden"));

        let mut settled = Vec::new();
        let report = coordinator
            .connect_with(|id| {
                settled.push(id);
                future::ready(())
            })
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.requeued, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(settled, vec![queued[0], queued[2]]);
        assert_eq!(coordinator.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_reports_settled_items() {
        let store = MemoryStore::new();
        let update = QueuedUpdate::new("user1", delta(&[("go", 10)]));
        let id = update.id;
        let mut coordinator = SyncCoordinator::new(store.clone());
        coordinator.connect().await.unwrap();
        coordinator.queue.enqueue(update);

        let mut settled = Vec::new();
        let leftover = coordinator
            .shutdown_with(|id| {
                settled.push(id);
                future::ready(())
            })
            .await;

        assert!(leftover.is_empty());
        assert_eq!(settled, vec![id]);
    }

    #[tokio::test]
    async fn test_disconnect_queues_again() {
        let store = MemoryStore::new();
        let mut coordinator = connected(&store).await;

        coordinator.disconnect();
        let outcome = coordinator.submit("user1", delta(&[("go", 10)])).await;

        assert_eq!(outcome, Outcome::Queued);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_atomic_increment_replaces_read_merge_write() {
        let store = MemoryStore::with_atomic_increment();
        store.insert(DayRecord::new("user1", DAY).with_language("go", 120));
        let mut coordinator = connected(&store).await;

        let outcome = coordinator
            .submit("user1", delta(&[("go", 10), ("rust", 20)]))
            .await;

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(store.read_count(), 0);
        let record = store.get("user1", DAY).unwrap();
        assert_eq!(record.total_seconds, 150);
        assert_eq!(record.languages["rust"], 20);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let store = MemoryStore::new();
        let mut coordinator = connected(&store).await;
        store.fail_next_write(StoreError::transient("ETIMEDOUT"));
        coordinator.submit("user1", delta(&[("go", 10)])).await;

        let leftover = coordinator.shutdown().await;

        assert!(leftover.is_empty());
        assert!(store.is_closed());
        assert_eq!(store.get("user1", DAY).unwrap().total_seconds, 10);
    }

    #[tokio::test]
    async fn test_shutdown_hands_back_undelivered() {
        let store = MemoryStore::new();
        let mut coordinator = SyncCoordinator::new(store.clone());
        coordinator.submit("user1", delta(&[("go", 10)])).await;

        let leftover = coordinator.shutdown().await;

        assert_eq!(leftover.len(), 1);
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_with_pending_restores_queue() {
        let store = MemoryStore::new();
        let pending = vec![
            QueuedUpdate::new("user1", delta(&[("go", 10)])),
            QueuedUpdate::new("user1", delta(&[("rust", 5)])),
        ];
        let mut coordinator = SyncCoordinator::with_pending(store.clone(), pending);
        assert_eq!(coordinator.pending_len(), 2);

        coordinator.connect().await.unwrap();

        let record = store.get("user1", DAY).unwrap();
        assert_eq!(record.total_seconds, 15);
        assert_eq!(record.languages.len(), 2);
    }
}
