//! A sync coordinator whose undelivered updates outlive the process.
//!
//! Opening a session restores parked updates from the local database into
//! the coordinator's queue. A parked row is deleted as soon as its update is
//! delivered or rejected, so a crash mid-sync never replays it. Closing the
//! session shuts the coordinator down and parks whatever it hands back.

use devtime_core::{DeltaRecord, DrainReport, Outcome, RemoteStore, StoreError, SyncCoordinator};
use uuid::Uuid;

use crate::db::PendingRepository;

pub struct SyncSession<S> {
    coordinator: SyncCoordinator<S>,
    pending: PendingRepository,
}

impl<S: RemoteStore> SyncSession<S> {
    /// Builds a coordinator over `store` seeded with the parked updates.
    ///
    /// The session starts disconnected; call [`SyncSession::connect`].
    pub async fn open(store: S, pending: PendingRepository) -> Result<Self, sqlx::Error> {
        let restored = pending.load_all().await?;
        if !restored.is_empty() {
            tracing::info!(count = restored.len(), "Restored pending updates");
        }

        Ok(Self {
            coordinator: SyncCoordinator::with_pending(store, restored),
            pending,
        })
    }

    pub async fn connect(&mut self) -> Result<DrainReport, StoreError> {
        let pending = &self.pending;
        self.coordinator
            .connect_with(|id| unpark(pending, id))
            .await
    }

    pub async fn submit(&mut self, user_id: &str, delta: DeltaRecord) -> Outcome {
        self.coordinator.submit(user_id, delta).await
    }

    pub fn coordinator(&self) -> &SyncCoordinator<S> {
        &self.coordinator
    }

    /// Shuts the coordinator down and parks the leftovers.
    ///
    /// Returns how many updates are still waiting for delivery.
    pub async fn close(self) -> Result<usize, sqlx::Error> {
        let pending = &self.pending;
        let leftover = self
            .coordinator
            .shutdown_with(|id| unpark(pending, id))
            .await;
        self.pending.replace_all(&leftover).await?;
        Ok(leftover.len())
    }
}

/// Deletes the parked row of a settled update.
async fn unpark(pending: &PendingRepository, id: Uuid) {
    if let Err(e) = pending.remove(id).await {
        tracing::warn!(id = %id, error = %e, "Failed to unpark settled update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use devtime_core::{MemoryStore, StoreError};
    use tempfile::tempdir;

    fn delta(date: &str, lang: &str, seconds: u64) -> DeltaRecord {
        DeltaRecord::new(date).with_language(lang, seconds)
    }

    #[tokio::test]
    async fn test_offline_updates_survive_restart() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("devtime.db");
        let store = MemoryStore::new();
        store.set_offline(true);

        let pool = init_db(&db_path).await.unwrap();
        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        assert!(session.connect().await.is_err());
        assert_eq!(
            session.submit("alice", delta("2024-03-01", "rust", 60)).await,
            Outcome::Queued
        );
        assert_eq!(
            session.submit("alice", delta("2024-03-01", "go", 30)).await,
            Outcome::Queued
        );
        assert_eq!(session.close().await.unwrap(), 2);
        assert_eq!(PendingRepository::new(pool.clone()).count().await.unwrap(), 2);

        store.set_offline(false);
        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        assert_eq!(session.coordinator().pending_len(), 2);

        let report = session.connect().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(session.close().await.unwrap(), 0);
        assert_eq!(PendingRepository::new(pool).count().await.unwrap(), 0);

        let record = store.get("alice", "2024-03-01").unwrap();
        assert_eq!(record.total_seconds, 90);
        assert_eq!(record.languages.get("rust"), Some(&60));
        assert_eq!(record.languages.get("go"), Some(&30));
    }

    #[tokio::test]
    async fn test_exit_without_close_does_not_redeliver() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("devtime.db")).await.unwrap();
        let store = MemoryStore::new();
        store.set_offline(true);

        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        session.submit("alice", delta("2024-03-01", "rust", 60)).await;
        session.close().await.unwrap();

        store.set_offline(false);
        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        assert_eq!(session.connect().await.unwrap().delivered, 1);
        assert_eq!(PendingRepository::new(pool.clone()).count().await.unwrap(), 0);
        // Process dies before close()
        drop(session);

        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        assert_eq!(session.connect().await.unwrap().attempted, 0);
        session.close().await.unwrap();

        assert_eq!(store.get("alice", "2024-03-01").unwrap().total_seconds, 60);
    }

    #[tokio::test]
    async fn test_requeued_update_stays_parked() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("devtime.db")).await.unwrap();
        let store = MemoryStore::new();
        store.set_offline(true);

        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        session.submit("alice", delta("2024-03-01", "rust", 60)).await;
        session.submit("alice", delta("2024-03-02", "rust", 30)).await;
        session.close().await.unwrap();

        store.set_offline(false);
        store.fail_day("alice", "2024-03-02", StoreError::transient("ETIMEDOUT"));
        let mut session = SyncSession::open(store.clone(), PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        let report = session.connect().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.requeued, 1);
        drop(session);

        let parked = PendingRepository::new(pool).load_all().await.unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].delta.date, "2024-03-02");
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_parked() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("devtime.db")).await.unwrap();
        let store = MemoryStore::new();
        store.fail_day("alice", "2024-03-01", StoreError::permanent("forbidden"));

        let mut session = SyncSession::open(store, PendingRepository::new(pool.clone()))
            .await
            .unwrap();
        session.connect().await.unwrap();
        assert_eq!(
            session.submit("alice", delta("2024-03-01", "rust", 60)).await,
            Outcome::Failed
        );
        assert_eq!(session.close().await.unwrap(), 0);
        assert_eq!(PendingRepository::new(pool).count().await.unwrap(), 0);
    }
}
