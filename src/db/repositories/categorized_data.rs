use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bson::oid::ObjectId;
use log::debug;
use mongodb::Collection;

use crate::db::models::CategorizedData;
use crate::db::Database;
use crate::pipeline::ports::CategorizedDataStore;

const COLLECTION: &str = "categorized_data";

impl Database {
    fn categorized_data(&self) -> Collection<CategorizedData> {
        self.database().collection(COLLECTION)
    }
}

#[async_trait]
impl CategorizedDataStore for Database {
    async fn update_category_ids(&self, updates: &HashMap<String, ObjectId>) -> Result<()> {
        let namespace = self.categorized_data().namespace();
        let modified = self.bulk_update_category_ids(namespace, updates).await?;
        debug!("updated {modified} categorized data documents");
        Ok(())
    }
}
