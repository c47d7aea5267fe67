mod categorized_data;
mod category_patterns;
mod usage_logs;

use std::collections::HashMap;

use anyhow::{Context, Result};
use bson::{doc, oid::ObjectId};
use log::warn;
use mongodb::options::{UpdateOneModel, WriteModel};
use mongodb::Namespace;

use super::Database;

impl Database {
    /// Builds one update-by-id per entry and submits them as a single bulk
    /// write. Ids that are not valid 24-hex document ids are logged and
    /// skipped rather than failing the batch.
    pub(crate) async fn bulk_update_category_ids(
        &self,
        namespace: Namespace,
        updates: &HashMap<String, ObjectId>,
    ) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut operations = Vec::with_capacity(updates.len());
        for (raw_id, category_id) in updates {
            let document_id = match ObjectId::parse_str(raw_id) {
                Ok(id) => id,
                Err(err) => {
                    warn!("invalid document id {raw_id} for {namespace}: {err}");
                    continue;
                }
            };

            let model = UpdateOneModel::builder()
                .namespace(namespace.clone())
                .filter(doc! { "_id": document_id })
                .update(doc! { "$set": { "categoryId": *category_id } })
                .build();
            operations.push(WriteModel::UpdateOne(model));
        }

        if operations.is_empty() {
            return Ok(0);
        }

        let result = self
            .client()
            .bulk_write(operations)
            .await
            .with_context(|| format!("bulk category update on {namespace} failed"))?;

        Ok(result.modified_count as u64)
    }
}
