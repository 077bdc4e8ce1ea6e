//! Server-side day record storage.
//!
//! Records live in SQLite, one `day_records` row per `(user_id, date)` plus
//! one `day_languages` row per language:
//! ```text
//! day_records(user_id, date, total_seconds)
//! day_languages(user_id, date, language, seconds)
//! ```
//!
//! `increment` adds a delta inside a single transaction using upserts, so
//! concurrent clients never lose each other's time.

use devtime_core::{DayRecord, DeltaRecord, LanguageSeconds};
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::path::Path;

use crate::db::open_pool;

/// Initialize the server database and run its migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let pool = open_pool(path).await?;
    sqlx::migrate!("./migrations/server").run(&pool).await?;
    Ok(pool)
}

/// Counters above `i64::MAX` cannot be stored and are rejected.
fn to_db(seconds: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(seconds).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// A negative counter means a corrupt row.
fn from_db(seconds: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(seconds).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[derive(sqlx::FromRow)]
struct DayRow {
    user_id: String,
    date: String,
    total_seconds: i64,
}

#[derive(sqlx::FromRow)]
struct LanguageRow {
    date: String,
    language: String,
    seconds: i64,
}

/// Loads one record using an existing connection (or transaction).
async fn load_record(
    conn: &mut SqliteConnection,
    user_id: &str,
    date: &str,
) -> Result<Option<DayRecord>, sqlx::Error> {
    let row: Option<DayRow> = sqlx::query_as(
        "SELECT user_id, date, total_seconds FROM day_records WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let languages: Vec<LanguageRow> = sqlx::query_as(
        "SELECT date, language, seconds FROM day_languages WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(DayRecord {
        user_id: row.user_id,
        date: row.date,
        total_seconds: from_db(row.total_seconds)?,
        languages: languages
            .into_iter()
            .map(|l| Ok((l.language, from_db(l.seconds)?)))
            .collect::<Result<_, sqlx::Error>>()?,
    }))
}

#[derive(Debug, Clone)]
pub struct DayStore {
    pool: SqlitePool,
}

impl DayStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: &str, date: &str) -> Result<Option<DayRecord>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        load_record(&mut conn, user_id, date).await
    }

    /// Replaces the whole record, languages included.
    pub async fn put(&self, record: &DayRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO day_records (user_id, date, total_seconds) VALUES (?, ?, ?)
            ON CONFLICT (user_id, date) DO UPDATE SET total_seconds = excluded.total_seconds
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.date)
        .bind(to_db(record.total_seconds)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM day_languages WHERE user_id = ? AND date = ?")
            .bind(&record.user_id)
            .bind(&record.date)
            .execute(&mut *tx)
            .await?;

        for (language, seconds) in &record.languages {
            sqlx::query(
                "INSERT INTO day_languages (user_id, date, language, seconds) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.user_id)
            .bind(&record.date)
            .bind(language)
            .bind(to_db(*seconds)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Adds a delta to the stored record and returns the result.
    pub async fn increment(
        &self,
        user_id: &str,
        delta: &DeltaRecord,
    ) -> Result<DayRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO day_records (user_id, date, total_seconds) VALUES (?, ?, ?)
            ON CONFLICT (user_id, date) DO UPDATE SET total_seconds = total_seconds + excluded.total_seconds
            "#,
        )
        .bind(user_id)
        .bind(&delta.date)
        .bind(to_db(delta.total_seconds)?)
        .execute(&mut *tx)
        .await?;

        for (language, seconds) in &delta.languages {
            sqlx::query(
                r#"
                INSERT INTO day_languages (user_id, date, language, seconds) VALUES (?, ?, ?, ?)
                ON CONFLICT (user_id, date, language) DO UPDATE SET seconds = seconds + excluded.seconds
                "#,
            )
            .bind(user_id)
            .bind(&delta.date)
            .bind(language)
            .bind(to_db(*seconds)?)
            .execute(&mut *tx)
            .await?;
        }

        let record = load_record(&mut tx, user_id, &delta.date)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        tx.commit().await?;
        Ok(record)
    }

    /// Records for `user_id` with `from <= date <= to`, by date.
    pub async fn list_range(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<DayRecord>, sqlx::Error> {
        let rows: Vec<DayRow> = sqlx::query_as(
            "SELECT user_id, date, total_seconds FROM day_records WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let language_rows: Vec<LanguageRow> = sqlx::query_as(
            "SELECT date, language, seconds FROM day_languages WHERE user_id = ? AND date >= ? AND date <= ?",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut languages: HashMap<String, LanguageSeconds> = HashMap::new();
        for row in language_rows {
            languages
                .entry(row.date)
                .or_default()
                .insert(row.language, from_db(row.seconds)?);
        }

        rows.into_iter()
            .map(|row| {
                Ok(DayRecord {
                    languages: languages.remove(&row.date).unwrap_or_default(),
                    total_seconds: from_db(row.total_seconds)?,
                    user_id: row.user_id,
                    date: row.date,
                })
            })
            .collect()
    }
}
