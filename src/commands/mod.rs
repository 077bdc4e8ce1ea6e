mod config_cmd;
mod record;
mod show;
mod status;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use record::RecordCommand;
pub use show::ShowCommand;
pub use status::StatusCommand;
pub use sync_cmd::SyncCommand;

use chrono::NaiveDate;
use devtime::config::Config;
use devtime_core::{HttpStore, StoreError};

/// Error type for commands that talk to the server or the local database
#[derive(Debug)]
pub enum CommandError {
    /// Sync is not configured (missing server_url or api_key)
    NotConfigured,
    /// The server rejected an update; the time it carried is dropped
    Rejected(String),
    Store(StoreError),
    Database(sqlx::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::NotConfigured => write!(
                f,
                "Sync not configured. Set sync.server_url and sync.api_key in your config file, \
                 or DEVTIME_SYNC_URL and DEVTIME_SYNC_API_KEY."
            ),
            CommandError::Rejected(msg) => write!(f, "Update rejected: {}", msg),
            CommandError::Store(e) => write!(f, "{}", e),
            CommandError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::Store(e)
    }
}

impl From<sqlx::Error> for CommandError {
    fn from(e: sqlx::Error) -> Self {
        CommandError::Database(e)
    }
}

/// Builds the HTTP store from the sync section of the config.
fn http_store(config: &Config) -> Result<HttpStore, CommandError> {
    match (&config.sync.server_url, &config.sync.api_key) {
        (Some(url), Some(key)) => Ok(HttpStore::new(url, key, config.sync.timeout())?),
        _ => Err(CommandError::NotConfigured),
    }
}

/// Formats `date` as stored, defaulting to today in local time.
fn day_key(date: Option<NaiveDate>) -> String {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_key_formats_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(day_key(Some(date)), "2024-03-07");
        assert_eq!(day_key(None).len(), 10);
    }
}
