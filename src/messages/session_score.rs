use chrono::NaiveDate;

/// Downstream event emitted once per record that ends a focus session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionScoreMessage {
    pub user_id: String,
    pub session_date: NaiveDate,
    pub session: i64,
}

impl SessionScoreMessage {
    pub fn new(user_id: String, session_date: NaiveDate, session: i64) -> Self {
        Self {
            user_id,
            session_date,
            session,
        }
    }

    /// Flat name/value pairs in the shape the downstream stream expects.
    pub fn to_stream_fields(&self) -> Vec<(String, String)> {
        vec![
            ("userId".to_string(), self.user_id.clone()),
            (
                "sessionDate".to_string(),
                self.session_date.format("%Y-%m-%d").to_string(),
            ),
            ("session".to_string(), self.session.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_fields_shape() {
        let msg = SessionScoreMessage::new(
            "u3".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            4,
        );

        assert_eq!(
            msg.to_stream_fields(),
            vec![
                ("userId".to_string(), "u3".to_string()),
                ("sessionDate".to_string(), "2024-01-15".to_string()),
                ("session".to_string(), "4".to_string()),
            ]
        );
    }
}
