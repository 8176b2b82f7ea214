//! Database access for the export engine
//!
//! The engine never talks to the driver directly. It goes through
//! [`DocumentSource`], which exposes exactly what an export needs:
//! collection enumeration, per-collection counts and a fresh batched cursor
//! per call. [`MongoSource`] is the production implementation.

use async_trait::async_trait;

use crate::error::Result;

pub mod mongo;
pub mod streaming;

#[cfg(test)]
pub(crate) mod memory;

pub use mongo::MongoSource;
pub use streaming::{CursorStreamingQuery, StreamingQuery};

/// Read-only view of one database, shared by every export worker
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Names of every collection in the database
    async fn list_collection_names(&self) -> Result<Vec<String>>;

    /// Number of documents in `collection` (empty filter)
    async fn count_documents(&self, collection: &str) -> Result<u64>;

    /// Open a new cursor over every document of `collection`
    ///
    /// Each call returns an independent cursor; cursors are never shared
    /// between workers.
    async fn open_cursor(
        &self,
        collection: &str,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>>;
}
