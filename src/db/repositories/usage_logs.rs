use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bson::oid::ObjectId;
use log::debug;
use mongodb::Collection;

use crate::db::models::UsageLog;
use crate::db::Database;
use crate::pipeline::ports::UsageLogStore;

const COLLECTION: &str = "pomodoro_usage_log";

impl Database {
    fn usage_logs(&self) -> Collection<UsageLog> {
        self.database().collection(COLLECTION)
    }
}

#[async_trait]
impl UsageLogStore for Database {
    async fn update_category_ids(&self, updates: &HashMap<String, ObjectId>) -> Result<()> {
        let namespace = self.usage_logs().namespace();
        let modified = self.bulk_update_category_ids(namespace, updates).await?;
        debug!("updated {modified} usage log documents");
        Ok(())
    }
}
