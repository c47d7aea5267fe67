use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One focus-interval usage record owned by the historical analytics store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "categorizedDataId")]
    pub categorized_data_id: ObjectId,
    #[serde(rename = "categoryId")]
    pub category_id: ObjectId,
    pub session: i64,
    #[serde(rename = "sessionMinutes")]
    pub session_minutes: i64,
    #[serde(rename = "sessionDate", with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub session_date: DateTime<Utc>,
    pub timestamp: f64,
    pub duration: f64,
}
