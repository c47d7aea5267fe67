use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One classification rule: a category plus the literal app and domain
/// patterns that map to it. Loaded once at startup into the matchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPattern {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub category: String,
    #[serde(rename = "appPatterns", default)]
    pub app_patterns: Vec<String>,
    #[serde(rename = "domainPatterns", default)]
    pub domain_patterns: Vec<String>,
}
