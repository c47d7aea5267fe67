pub mod models;
mod repositories;

use anyhow::{Context, Result};
use bson::doc;
use log::info;
use mongodb::{Client, Database as MongoDatabase};

/// Shared handle to the analytics document store.
#[derive(Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("failed to build MongoDB client")?;
        let db = client.database(db_name);

        // the driver connects lazily; ping so a bad URI fails startup
        db.run_command(doc! { "ping": 1 })
            .await
            .context("failed to reach MongoDB")?;

        info!("connected to MongoDB database {db_name}");
        Ok(Self { client, db })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn database(&self) -> &MongoDatabase {
        &self.db
    }
}
