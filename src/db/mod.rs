mod pending_repo;

pub use pending_repo::PendingRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Opens (creating if needed) an SQLite database without running migrations.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Initialize the local client database and run its migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let pool = open_pool(path).await?;
    sqlx::migrate!("./migrations/client").run(&pool).await?;
    Ok(pool)
}
