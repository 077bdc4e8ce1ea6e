use chrono::NaiveDate;
use clap::Args;
use devtime::config::Config;
use devtime::db::PendingRepository;
use devtime::session::SyncSession;
use devtime_core::{DeltaAccumulator, Outcome};
use sqlx::SqlitePool;

use super::{day_key, http_store, CommandError};

/// Record coding time for a day
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Time per language as NAME=SECONDS (repeatable)
    #[arg(long = "lang", short, required = true, value_parser = parse_language_seconds)]
    languages: Vec<(String, u64)>,

    /// Day the time belongs to (YYYY-MM-DD, default: today)
    #[arg(long, short)]
    date: Option<NaiveDate>,
}

/// Parses `rust=120` into `("rust", 120)`.
fn parse_language_seconds(s: &str) -> Result<(String, u64), String> {
    let (name, seconds) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=SECONDS, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing language name in '{}'", s));
    }
    let seconds = seconds
        .trim()
        .parse()
        .map_err(|_| format!("invalid seconds in '{}'", s))?;
    Ok((name.to_string(), seconds))
}

impl RecordCommand {
    pub async fn run(&self, pool: &SqlitePool, config: &Config) -> Result<(), CommandError> {
        let date = day_key(self.date);
        let mut accumulator = DeltaAccumulator::new();
        for (language, seconds) in &self.languages {
            accumulator.add(&date, language, *seconds);
        }

        let Some(delta) = accumulator.take() else {
            println!("Nothing to record.");
            return Ok(());
        };
        let total = delta.total_seconds;

        let store = http_store(config)?;
        let mut session = SyncSession::open(store, PendingRepository::new(pool.clone())).await?;
        if let Err(e) = session.connect().await {
            tracing::warn!(error = %e, "Server unavailable");
        }

        let user_id = &config.user_id.value;
        let outcome = session.submit(user_id, delta).await;
        let pending = session.close().await?;

        match outcome {
            Outcome::Success => println!("Recorded {}s for {} ({})", total, date, outcome),
            Outcome::Queued => println!(
                "Recorded {}s for {} ({}, {} update(s) waiting for the server)",
                total, date, outcome, pending
            ),
            Outcome::Failed => {
                tracing::warn!(user_id = %user_id, date = %date, seconds = total, "Dropping rejected update");
                return Err(CommandError::Rejected(format!(
                    "{}s for {} could not be stored",
                    total, date
                )));
            }
        }

        Ok(())
    }
}
