//! [`DocumentSource`] backed by a live MongoDB database

use async_trait::async_trait;
use mongodb::Database;
use mongodb::bson::{Document, doc};
use tracing::debug;

use super::{CursorStreamingQuery, DocumentSource, StreamingQuery};
use crate::error::Result;

/// Document source reading from one MongoDB database
#[derive(Clone)]
pub struct MongoSource {
    database: Database,
}

impl MongoSource {
    /// Wrap a database handle
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Name of the wrapped database
    pub fn name(&self) -> &str {
        self.database.name()
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    async fn list_collection_names(&self) -> Result<Vec<String>> {
        let mut names = self.database.list_collection_names().await?;
        names.sort();
        debug!("Database '{}' has {} collections", self.name(), names.len());
        Ok(names)
    }

    async fn count_documents(&self, collection: &str) -> Result<u64> {
        let count = self
            .database
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await?;
        Ok(count)
    }

    async fn open_cursor(
        &self,
        collection: &str,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>> {
        let cursor = self
            .database
            .collection::<Document>(collection)
            .find(doc! {})
            .batch_size(batch_size)
            .await?;
        Ok(Box::new(CursorStreamingQuery::new(
            cursor, batch_size, collection,
        )))
    }
}
