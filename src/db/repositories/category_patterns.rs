use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;
use log::debug;

use crate::db::models::CategoryPattern;
use crate::db::Database;
use crate::pipeline::ports::CategoryMappingSource;

const COLLECTION: &str = "category_pattern";

impl Database {
    /// Loads every classification rule; the matchers are built from these
    /// once at startup.
    pub async fn load_category_patterns(&self) -> Result<Vec<CategoryPattern>> {
        let cursor = self
            .database()
            .collection::<CategoryPattern>(COLLECTION)
            .find(doc! {})
            .await
            .context("failed to query category patterns")?;

        let patterns: Vec<CategoryPattern> = cursor
            .try_collect()
            .await
            .context("failed to decode category patterns")?;

        debug!("loaded {} category patterns", patterns.len());
        Ok(patterns)
    }
}

#[async_trait]
impl CategoryMappingSource for Database {
    async fn category_to_id_map(&self) -> Result<HashMap<String, ObjectId>> {
        let patterns = self.load_category_patterns().await?;
        Ok(patterns
            .into_iter()
            .map(|pattern| (pattern.category, pattern.id))
            .collect())
    }
}
