//! Delta synchronization.
//!
//! Local deltas reach the remote store through a [`SyncCoordinator`]:
//!
//! 1. Not connected yet: the delta goes straight into the [`OfflineQueue`]
//! 2. Read the stored day record (absence is normal)
//! 3. Merge the delta into it
//! 4. Write the merged record back
//!
//! A transient failure in 2-4 queues the original delta; a permanent one is
//! reported as [`Outcome::Failed`] and dropped. The queue is drained after
//! every successful connect and once more on shutdown.

mod coordinator;
mod queue;

pub use coordinator::{DrainReport, Outcome, SyncCoordinator};
pub use queue::OfflineQueue;
