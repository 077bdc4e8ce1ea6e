//! Remote store adapters.
//!
//! A [`RemoteStore`] reads and writes one [`DayRecord`] per `(user_id, date)`.
//! It is the only part of the sync path that performs I/O, and it reports
//! failures already classified as transient or permanent.

mod error;
mod http;
mod memory;

use async_trait::async_trait;

use crate::models::{DayRecord, DeltaRecord};

pub use error::{classify_message, ErrorKind, StoreError};
pub use http::{HttpStore, DEFAULT_TIMEOUT};
pub use memory::MemoryStore;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Establishes (or verifies) the backend connection.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Reads the record for a day. A missing record is `Ok(None)`.
    async fn read(&self, user_id: &str, date: &str) -> Result<Option<DayRecord>, StoreError>;

    /// Replaces the record stored under `(record.user_id, record.date)`.
    async fn write(&self, record: &DayRecord) -> Result<(), StoreError>;

    /// Whether [`RemoteStore::increment`] is available on this backend.
    fn supports_increment(&self) -> bool {
        false
    }

    /// Adds a delta to the stored record in one atomic backend operation.
    async fn increment(
        &self,
        _user_id: &str,
        _delta: &DeltaRecord,
    ) -> Result<DayRecord, StoreError> {
        Err(StoreError::permanent(
            "atomic increment is not supported by this store",
        ))
    }

    /// Releases the backend connection.
    async fn close(&self) {}
}
