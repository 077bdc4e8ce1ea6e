use clap::Args;
use devtime::config::Config;
use devtime::db::PendingRepository;
use devtime_core::RemoteStore;
use sqlx::SqlitePool;

use super::{http_store, CommandError};

/// Show sync configuration, pending updates and server status
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(&self, pool: &SqlitePool, config: &Config) -> Result<(), CommandError> {
        let pending = PendingRepository::new(pool.clone()).count().await?;

        println!("Sync Status");
        println!("===========");
        println!();
        println!("User:    {}", config.user_id.value);
        println!("Pending: {} update(s)", pending);

        if !config.sync.is_configured() {
            println!("Server:  not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sync:");
            println!("    server_url: \"http://localhost:8080\"");
            println!("    api_key: \"your-api-key\"");
            println!();
            println!("Or set DEVTIME_SYNC_URL and DEVTIME_SYNC_API_KEY.");
            return Ok(());
        }

        let store = http_store(config)?;
        println!("Server:  {}", store.server_url());
        match store.connect().await {
            Ok(()) => println!("         reachable"),
            Err(e) => println!("         unreachable ({})", e),
        }
        store.close().await;

        Ok(())
    }
}
