use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delta::DeltaRecord;

/// A delta waiting in the offline queue for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedUpdate {
    pub id: Uuid,
    pub user_id: String,
    pub delta: DeltaRecord,
    pub queued_at: DateTime<Utc>,
    /// Delivery attempts that failed transiently so far.
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedUpdate {
    pub fn new(user_id: impl Into<String>, delta: DeltaRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            delta,
            queued_at: Utc::now(),
            attempts: 0,
        }
    }

    pub fn date(&self) -> &str {
        &self.delta.date
    }
}
