//! devtime core library
//!
//! Day records, the additive merge engine and the offline-tolerant sync
//! coordinator shared by the devtime CLI and server.

pub mod accumulator;
pub mod merge;
pub mod models;
pub mod store;
pub mod sync;

pub use accumulator::DeltaAccumulator;
pub use merge::merge;
pub use models::{DayRecord, DeltaRecord, LanguageSeconds, QueuedUpdate};
pub use store::{ErrorKind, HttpStore, MemoryStore, RemoteStore, StoreError};
pub use sync::{DrainReport, OfflineQueue, Outcome, SyncCoordinator};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
