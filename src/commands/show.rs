use chrono::NaiveDate;
use clap::Args;
use devtime::config::Config;
use devtime_core::RemoteStore;

use super::{day_key, http_store, CommandError};

/// Show the server's record for a day
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Day to show (YYYY-MM-DD, default: today)
    #[arg(long, short)]
    date: Option<NaiveDate>,
}

impl ShowCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let date = day_key(self.date);
        let store = http_store(config)?;
        let user_id = &config.user_id.value;

        let record = store.read(user_id, &date).await;
        store.close().await;

        match record? {
            Some(record) => print!("{}", record),
            None => println!("No time recorded for {}.", date),
        }
        Ok(())
    }
}
