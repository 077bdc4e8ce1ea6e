//! Minimal in-process delta accumulator.
//!
//! Collects per-language seconds for the current day and hands them out as a
//! [`DeltaRecord`] at flush time.

use crate::models::DeltaRecord;

#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    pending: Option<DeltaRecord>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds seconds for `language` on `date`.
    ///
    /// If time for an earlier day is still pending it is returned so the
    /// caller can flush it before the new day starts accumulating.
    pub fn add(&mut self, date: &str, language: &str, seconds: u64) -> Option<DeltaRecord> {
        let rolled_over = if self.pending.as_ref().is_some_and(|p| p.date != date) {
            self.pending.take().filter(|d| !d.is_empty())
        } else {
            None
        };

        self.pending
            .get_or_insert_with(|| DeltaRecord::new(date))
            .add(language, seconds);

        rolled_over
    }

    /// The time accumulated since the last flush, if any.
    pub fn snapshot(&self) -> Option<&DeltaRecord> {
        self.pending.as_ref().filter(|d| !d.is_empty())
    }

    /// Takes the pending delta, leaving the accumulator at zero.
    ///
    /// Whatever the flush outcome, the time is no longer the accumulator's:
    /// it was merged, queued, or rejected for good.
    pub fn take(&mut self) -> Option<DeltaRecord> {
        self.pending.take().filter(|d| !d.is_empty())
    }
}
