//! Delivers parked updates to the server.

use clap::Args;
use devtime::config::Config;
use devtime::db::PendingRepository;
use devtime::session::SyncSession;
use sqlx::SqlitePool;

use super::{http_store, CommandError};

/// Deliver pending updates to the server
#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn run(&self, pool: &SqlitePool, config: &Config) -> Result<(), CommandError> {
        let store = http_store(config)?;
        let server_url = store.server_url().to_string();
        let mut session = SyncSession::open(store, PendingRepository::new(pool.clone())).await?;

        let pending = session.coordinator().pending_len();
        println!("Syncing {} pending update(s) with {}...", pending, server_url);

        let connected = session.connect().await;
        let remaining = session.close().await?;

        match connected {
            Ok(report) => {
                println!();
                println!("  delivered: {}", report.delivered);
                if report.requeued > 0 {
                    println!("  requeued:  {}", report.requeued);
                }
                if report.failed > 0 {
                    println!("  rejected:  {}", report.failed);
                }
                println!();
                if remaining == 0 {
                    println!("Sync complete.");
                } else {
                    println!("{} update(s) still pending.", remaining);
                }
                Ok(())
            }
            Err(e) => {
                println!("Server unreachable; {} update(s) still pending.", remaining);
                Err(e.into())
            }
        }
    }
}
