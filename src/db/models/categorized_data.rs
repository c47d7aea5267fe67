use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A distinct (app, url, title) activity shape and its resolved category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizedData {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub app: String,
    pub url: String,
    pub title: String,
    #[serde(rename = "categoryId")]
    pub category_id: ObjectId,
    #[serde(rename = "isLLMBased")]
    pub is_llm_based: bool,
}
