//! Contracts the classification pipeline writes through.
//!
//! Each sink is injected as a trait object so batch processing stays
//! testable without live backends. All implementations must be idempotent
//! under replay except the leaderboard increments, which the at-least-once
//! delivery model knowingly accepts.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::leaderboard::LeaderboardEntry;

/// Bulk category updates against the usage-log collection.
#[async_trait]
pub trait UsageLogStore: Send + Sync {
    async fn update_category_ids(&self, updates: &HashMap<String, ObjectId>) -> Result<()>;
}

/// Bulk category updates against the categorized-data collection.
#[async_trait]
pub trait CategorizedDataStore: Send + Sync {
    async fn update_category_ids(&self, updates: &HashMap<String, ObjectId>) -> Result<()>;
}

/// Pipelined sorted-set increments for the leaderboards.
#[async_trait]
pub trait LeaderboardCache: Send + Sync {
    async fn batch_increase_score(&self, entries: &[LeaderboardEntry]) -> Result<()>;
}

/// Source of the category-name to document-id snapshot.
#[async_trait]
pub trait CategoryMappingSource: Send + Sync {
    async fn category_to_id_map(&self) -> Result<HashMap<String, ObjectId>>;
}
