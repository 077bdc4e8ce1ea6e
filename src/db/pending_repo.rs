//! Local persistence for updates the coordinator could not deliver.
//!
//! The offline queue itself lives in memory. Between CLI invocations its
//! leftovers are parked here and restored, in order, into the next
//! coordinator.

use chrono::{DateTime, Utc};
use devtime_core::{DeltaRecord, LanguageSeconds, QueuedUpdate};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct PendingRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    id: String,
    user_id: String,
    date: String,
    total_seconds: i64,
    languages: String,
    queued_at: String,
    attempts: i64,
}

fn decode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn encode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Encode(Box::new(e))
}

impl PendingRow {
    fn into_update(self) -> Result<QueuedUpdate, sqlx::Error> {
        let languages: LanguageSeconds =
            serde_json::from_str(&self.languages).map_err(decode_error)?;

        Ok(QueuedUpdate {
            id: Uuid::parse_str(&self.id).map_err(decode_error)?,
            user_id: self.user_id,
            delta: DeltaRecord {
                date: self.date,
                total_seconds: u64::try_from(self.total_seconds).map_err(decode_error)?,
                languages,
            },
            queued_at: DateTime::parse_from_rfc3339(&self.queued_at)
                .map_err(decode_error)?
                .with_timezone(&Utc),
            attempts: u32::try_from(self.attempts).map_err(decode_error)?,
        })
    }
}

impl PendingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All parked updates, oldest first.
    pub async fn load_all(&self) -> Result<Vec<QueuedUpdate>, sqlx::Error> {
        let rows: Vec<PendingRow> = sqlx::query_as(
            "SELECT id, user_id, date, total_seconds, languages, queued_at, attempts FROM pending_updates ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingRow::into_update).collect()
    }

    /// Replaces the parked updates with `updates`, keeping their order.
    pub async fn replace_all(&self, updates: &[QueuedUpdate]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pending_updates")
            .execute(&mut *tx)
            .await?;

        for update in updates {
            let languages =
                serde_json::to_string(&update.delta.languages).map_err(decode_error)?;

            sqlx::query(
                r#"
                INSERT INTO pending_updates (id, user_id, date, total_seconds, languages, queued_at, attempts)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(update.id.to_string())
            .bind(&update.user_id)
            .bind(&update.delta.date)
            .bind(i64::try_from(update.delta.total_seconds).map_err(encode_error)?)
            .bind(&languages)
            .bind(update.queued_at.to_rfc3339())
            .bind(i64::from(update.attempts))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Drops one parked update, e.g. once it has been delivered.
    pub async fn remove(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM pending_updates WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_updates")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
