//! Additive merge of a stored day record with an incoming delta.
//!
//! The merge never replaces absolute values: repeated delivery of *different*
//! sequential deltas is safe, while delivering the *same* delta twice counts
//! its time twice.

use crate::models::{DayRecord, DeltaRecord};

/// Combines the stored record for a day (if any) with a delta.
///
/// Without an existing record the delta becomes the record for `user_id`.
/// Otherwise identity (`user_id`, `date`) comes from `existing` and every
/// counter is summed.
pub fn merge(user_id: &str, existing: Option<DayRecord>, incoming: &DeltaRecord) -> DayRecord {
    let Some(mut merged) = existing else {
        return incoming.clone().into_day_record(user_id);
    };

    merged.total_seconds = merged.total_seconds.saturating_add(incoming.total_seconds);
    for (language, seconds) in &incoming.languages {
        let entry = merged.languages.entry(language.clone()).or_insert(0);
        *entry = entry.saturating_add(*seconds);
    }

    merged
}
