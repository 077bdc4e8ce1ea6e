mod day_record;
mod delta;
mod queued_update;

pub use day_record::{DayRecord, LanguageSeconds};
pub use delta::DeltaRecord;
pub use queued_update::QueuedUpdate;
