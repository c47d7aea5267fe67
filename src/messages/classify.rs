use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};

/// One focus-session activity record checked out from the upstream stream.
///
/// Stream entries are flat string/string maps; every field is parsed
/// leniently and silently defaults when absent or malformed, so a partially
/// broken record is still classified rather than stalling the stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyMessage {
    pub user_id: String,
    pub categorized_data_id: String,
    pub usage_log_id: String,
    pub url: String,
    pub title: String,
    pub app: String,
    pub session: i64,
    pub session_date: NaiveDate,
    pub session_minutes: i64,
    pub duration: f64,
    pub timestamp: f64,
    pub is_end: bool,
}

impl ClassifyMessage {
    pub fn from_stream_fields(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).map(String::as_str).unwrap_or("");

        Self {
            user_id: get("userId").to_string(),
            categorized_data_id: get("categorizedDataId").to_string(),
            usage_log_id: get("pomodoroUsageLogId").to_string(),
            url: get("url").to_string(),
            title: get("title").to_string(),
            app: get("app").to_string(),
            session: get("session").parse().unwrap_or(0),
            session_date: parse_session_date(get("sessionDate")),
            session_minutes: get("sessionMinutes").parse().unwrap_or(0),
            duration: get("duration").parse().unwrap_or(0.0),
            timestamp: get("timestamp").parse().unwrap_or(0.0),
            is_end: parse_flag(get("isEnd")),
        }
    }
}

/// Accepts the calendar form first, then a full RFC 3339 timestamp.
fn parse_session_date(raw: &str) -> NaiveDate {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return datetime.date_naive();
    }
    NaiveDate::default()
}

/// The usual boolean spellings: 1/0, t/f, true/false in any casing.
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw,
        "1" | "t" | "T" | "true" | "TRUE" | "True"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_full_parse() {
        let msg = ClassifyMessage::from_stream_fields(&fields(&[
            ("userId", "u1"),
            ("categorizedDataId", "65f000000000000000000001"),
            ("pomodoroUsageLogId", "65f000000000000000000002"),
            ("url", "https://github.com/pulls"),
            ("title", "Pull requests"),
            ("app", "chrome"),
            ("session", "4"),
            ("sessionMinutes", "25"),
            ("sessionDate", "2024-01-15"),
            ("duration", "612.5"),
            ("timestamp", "1705281000.25"),
            ("isEnd", "true"),
        ]));

        assert_eq!(msg.user_id, "u1");
        assert_eq!(msg.categorized_data_id, "65f000000000000000000001");
        assert_eq!(msg.usage_log_id, "65f000000000000000000002");
        assert_eq!(msg.session, 4);
        assert_eq!(msg.session_minutes, 25);
        assert_eq!(
            msg.session_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(msg.duration, 612.5);
        assert_eq!(msg.timestamp, 1705281000.25);
        assert!(msg.is_end);
    }

    #[test]
    fn test_missing_fields_default() {
        let msg = ClassifyMessage::from_stream_fields(&fields(&[("userId", "u1")]));

        assert_eq!(msg.user_id, "u1");
        assert_eq!(msg.app, "");
        assert_eq!(msg.session, 0);
        assert_eq!(msg.duration, 0.0);
        assert_eq!(msg.session_date, NaiveDate::default());
        assert!(!msg.is_end);
    }

    #[test]
    fn test_malformed_numbers_default_without_dropping_the_rest() {
        let msg = ClassifyMessage::from_stream_fields(&fields(&[
            ("userId", "u1"),
            ("session", "four"),
            ("duration", "not-a-float"),
            ("timestamp", ""),
        ]));

        assert_eq!(msg.user_id, "u1");
        assert_eq!(msg.session, 0);
        assert_eq!(msg.duration, 0.0);
        assert_eq!(msg.timestamp, 0.0);
    }

    #[test]
    fn test_session_date_rfc3339_fallback() {
        let msg = ClassifyMessage::from_stream_fields(&fields(&[(
            "sessionDate",
            "2024-01-15T09:30:00+09:00",
        )]));

        assert_eq!(
            msg.session_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_boolean_spellings() {
        for raw in ["true", "True", "TRUE", "t", "T", "1"] {
            let msg = ClassifyMessage::from_stream_fields(&fields(&[("isEnd", raw)]));
            assert!(msg.is_end, "expected {raw:?} to parse as true");
        }
        for raw in ["false", "False", "FALSE", "f", "F", "0", "yes", ""] {
            let msg = ClassifyMessage::from_stream_fields(&fields(&[("isEnd", raw)]));
            assert!(!msg.is_end, "expected {raw:?} to parse as false");
        }
    }
}
