use serde::{Deserialize, Serialize};

use super::day_record::{DayRecord, LanguageSeconds};

/// Coding time elapsed since the last successful flush.
///
/// Same shape as [`DayRecord`] without the owner, but additive: it is only
/// ever added onto a stored total, never stored as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaRecord {
    pub date: String,
    pub total_seconds: u64,
    #[serde(default)]
    pub languages: LanguageSeconds,
}

impl DeltaRecord {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            total_seconds: 0,
            languages: LanguageSeconds::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>, seconds: u64) -> Self {
        self.add(language, seconds);
        self
    }

    /// Adds seconds for a language, keeping `total_seconds` in step.
    pub fn add(&mut self, language: impl Into<String>, seconds: u64) {
        let entry = self.languages.entry(language.into()).or_insert(0);
        *entry = entry.saturating_add(seconds);
        self.total_seconds = self.total_seconds.saturating_add(seconds);
    }

    /// Field-wise sum of two deltas for the same day.
    pub fn combine(&self, other: &DeltaRecord) -> DeltaRecord {
        let mut combined = self.clone();
        combined.total_seconds = combined.total_seconds.saturating_add(other.total_seconds);
        for (language, seconds) in &other.languages {
            let entry = combined.languages.entry(language.clone()).or_insert(0);
            *entry = entry.saturating_add(*seconds);
        }
        combined
    }

    pub fn is_empty(&self) -> bool {
        self.total_seconds == 0 && self.languages.values().all(|s| *s == 0)
    }

    /// Reinterprets the delta as the first stored record for `user_id`.
    pub fn into_day_record(self, user_id: impl Into<String>) -> DayRecord {
        DayRecord {
            user_id: user_id.into(),
            date: self.date,
            total_seconds: self.total_seconds,
            languages: self.languages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_tracks_total() {
        let mut delta = DeltaRecord::new("2024-01-01");
        delta.add("go", 10);
        delta.add("rust", 20);
        delta.add("go", 5);

        assert_eq!(delta.total_seconds, 35);
        assert_eq!(delta.languages["go"], 15);
        assert_eq!(delta.languages["rust"], 20);
    }

    #[test]
    fn test_combine_is_fieldwise() {
        let a = DeltaRecord::new("2024-01-01").with_language("go", 10);
        let b = DeltaRecord::new("2024-01-01")
            .with_language("go", 5)
            .with_language("rust", 7);

        let combined = a.combine(&b);
        assert_eq!(combined.total_seconds, 22);
        assert_eq!(combined.languages["go"], 15);
        assert_eq!(combined.languages["rust"], 7);
        assert_eq!(combined.date, "2024-01-01");
    }

    #[test]
    fn test_is_empty() {
        assert!(DeltaRecord::new("2024-01-01").is_empty());
        assert!(!DeltaRecord::new("2024-01-01")
            .with_language("go", 1)
            .is_empty());
    }

    #[test]
    fn test_into_day_record() {
        let record = DeltaRecord::new("2024-01-01")
            .with_language("go", 120)
            .into_day_record("user1");

        assert_eq!(record.user_id, "user1");
        assert_eq!(record.date, "2024-01-01");
        assert_eq!(record.total_seconds, 120);
        assert_eq!(record.languages["go"], 120);
    }

    #[test]
    fn test_parses_accumulator_shape() {
        let delta: DeltaRecord = serde_json::from_str(
            r#"{"date":"2024-01-01","totalSeconds":30,"languages":{"go":10,"rust":20}}"#,
        )
        .unwrap();

        assert_eq!(delta.total_seconds, 30);
        assert_eq!(delta.languages.len(), 2);
    }
}
