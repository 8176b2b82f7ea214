//! Batched streaming over database cursors
//!
//! Documents are pulled in fixed-size batches so memory use stays bounded
//! regardless of collection size.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Cursor;
use mongodb::bson::Document;
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Trait for streaming query results in batches
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of documents
    ///
    /// # Returns
    /// * `Result<Option<Vec<Document>>>` - Next batch of documents, or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>>;

    /// Close the query and release server resources
    async fn close(&mut self) -> Result<()>;
}

/// Where a cursor stands in its collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// More documents may follow
    Open,
    /// The server reported the end of the collection
    Exhausted,
    /// The driver returned an error; the cursor was dropped
    Failed,
    /// Closed by the caller before the end (cancellation or a write failure)
    Abandoned,
}

/// Per-collection cursor over a `find({})` result
///
/// Keeps its own bookkeeping (documents, batches, state) so the logs of one
/// collection's export read on their own when several run side by side.
pub struct CursorStreamingQuery {
    cursor: Option<Cursor<Document>>,
    batch_size: u32,
    collection: String,
    documents: u64,
    batches: u64,
    state: CursorState,
}

impl CursorStreamingQuery {
    /// Wrap the cursor opened for `collection`
    pub fn new(cursor: Cursor<Document>, batch_size: u32, collection: &str) -> Self {
        Self {
            cursor: Some(cursor),
            batch_size: batch_size.max(1),
            collection: collection.to_string(),
            documents: 0,
            batches: 0,
            state: CursorState::Open,
        }
    }

    fn finish(&mut self, state: CursorState) {
        // Dropping the driver cursor kills it server-side if still open
        self.cursor = None;
        self.state = state;
    }
}

#[async_trait]
impl StreamingQuery for CursorStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let mut batch = Vec::with_capacity(self.batch_size as usize);
        while batch.len() < self.batch_size as usize {
            match cursor.try_next().await {
                Ok(Some(doc)) => batch.push(doc),
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Cursor on '{}' failed after {} documents in {} batches: {}",
                        self.collection,
                        self.documents + batch.len() as u64,
                        self.batches,
                        e
                    );
                    self.finish(CursorState::Failed);
                    return Err(e.into());
                }
            }
        }

        if batch.is_empty() {
            debug!(
                "'{}' exhausted: {} documents in {} batches",
                self.collection, self.documents, self.batches
            );
            self.finish(CursorState::Exhausted);
            return Ok(None);
        }

        self.documents += batch.len() as u64;
        self.batches += 1;
        trace!(
            "'{}' batch {}: {} documents ({} so far)",
            self.collection,
            self.batches,
            batch.len(),
            self.documents
        );
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        if self.state == CursorState::Open {
            debug!(
                "Abandoning cursor on '{}' after {} documents",
                self.collection, self.documents
            );
            self.finish(CursorState::Abandoned);
        }
        Ok(())
    }
}
