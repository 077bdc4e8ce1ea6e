use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Seconds spent per language name.
pub type LanguageSeconds = BTreeMap<String, u64>;

/// Cumulative coding time for one user on one calendar day.
///
/// Keyed by `(user_id, date)`. `total_seconds` is expected to equal the sum of
/// `languages`, but nothing here enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub user_id: String,
    /// ISO `YYYY-MM-DD`
    pub date: String,
    pub total_seconds: u64,
    #[serde(default)]
    pub languages: LanguageSeconds,
}

impl DayRecord {
    pub fn new(user_id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            date: date.into(),
            total_seconds: 0,
            languages: LanguageSeconds::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>, seconds: u64) -> Self {
        let counter = self.languages.entry(language.into()).or_insert(0);
        *counter = counter.saturating_add(seconds);
        self.total_seconds = self.total_seconds.saturating_add(seconds);
        self
    }

    /// Sum of the per-language counters.
    pub fn languages_total(&self) -> u64 {
        self.languages.values().sum()
    }
}

impl fmt::Display for DayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.date, format_duration(self.total_seconds))?;

        let mut by_time: Vec<_> = self.languages.iter().collect();
        by_time.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (language, seconds) in by_time {
            writeln!(f, "  {:<16} {}", language, format_duration(*seconds))?;
        }

        Ok(())
    }
}

fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_record_new() {
        let record = DayRecord::new("user1", "2024-01-01");

        assert_eq!(record.user_id, "user1");
        assert_eq!(record.date, "2024-01-01");
        assert_eq!(record.total_seconds, 0);
        assert!(record.languages.is_empty());
    }

    #[test]
    fn test_with_language_keeps_total_in_step() {
        let record = DayRecord::new("user1", "2024-01-01")
            .with_language("go", 120)
            .with_language("rust", 30)
            .with_language("go", 10);

        assert_eq!(record.total_seconds, 160);
        assert_eq!(record.languages["go"], 130);
        assert_eq!(record.languages_total(), record.total_seconds);
    }

    #[test]
    fn test_with_language_saturates() {
        let record = DayRecord::new("user1", "2024-01-01")
            .with_language("go", u64::MAX)
            .with_language("go", 5)
            .with_language("rust", 1);

        assert_eq!(record.total_seconds, u64::MAX);
        assert_eq!(record.languages["go"], u64::MAX);
        assert_eq!(record.languages["rust"], 1);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let record = DayRecord::new("user1", "2024-01-01").with_language("go", 120);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["userId"], "user1");
        assert_eq!(json["totalSeconds"], 120);
        assert_eq!(json["languages"]["go"], 120);
    }

    #[test]
    fn test_missing_languages_defaults_to_empty() {
        let record: DayRecord =
            serde_json::from_str(r#"{"userId":"u","date":"2024-01-01","totalSeconds":5}"#)
                .unwrap();
        assert!(record.languages.is_empty());
    }

    #[test]
    fn test_display_orders_by_time() {
        let record = DayRecord::new("user1", "2024-01-01")
            .with_language("go", 90)
            .with_language("rust", 3700);

        let output = format!("{}", record);
        assert!(output.starts_with("2024-01-01 (1h 03m)"));
        let rust_at = output.find("rust").unwrap();
        let go_at = output.find("go").unwrap();
        assert!(rust_at < go_at);
        assert!(output.contains("1m 30s"));
    }
}
