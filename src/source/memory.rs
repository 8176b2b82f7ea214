//! In-memory [`DocumentSource`] used by the engine tests

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio_util::sync::CancellationToken;

use super::{DocumentSource, StreamingQuery};
use crate::error::{ExporterError, Result};

/// Concurrency bookkeeping shared by all cursors of one source
#[derive(Default)]
pub(crate) struct CursorStats {
    active: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

impl CursorStats {
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct MemorySource {
    collections: BTreeMap<String, Vec<Document>>,
    failing_counts: HashSet<String>,
    failing_cursors: BTreeMap<String, usize>,
    stalling_counts: HashSet<String>,
    failing_closes: HashSet<String>,
    stalling_cursors: BTreeMap<String, usize>,
    cancel_after: Option<(String, usize, CancellationToken)>,
    stats: Arc<CursorStats>,
}

impl MemorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_collection(mut self, name: &str, docs: Vec<Document>) -> Self {
        self.collections.insert(name.to_string(), docs);
        self
    }

    /// `count_documents` on `name` fails
    pub(crate) fn failing_count(mut self, name: &str) -> Self {
        self.failing_counts.insert(name.to_string());
        self
    }

    /// The cursor on `name` fails once `after` documents were handed out
    pub(crate) fn failing_cursor(mut self, name: &str, after: usize) -> Self {
        self.failing_cursors.insert(name.to_string(), after);
        self
    }

    /// Closing the cursor on `name` reports an error
    pub(crate) fn failing_close(mut self, name: &str) -> Self {
        self.failing_closes.insert(name.to_string());
        self
    }

    /// `count_documents` on `name` never answers
    pub(crate) fn stalling_count(mut self, name: &str) -> Self {
        self.stalling_counts.insert(name.to_string());
        self
    }

    /// The cursor on `name` stops answering once `after` documents were handed out
    pub(crate) fn stalling_cursor(mut self, name: &str, after: usize) -> Self {
        self.stalling_cursors.insert(name.to_string(), after);
        self
    }

    /// Cancel `token` when the cursor on `name` is asked for more documents
    /// after having handed out `after` of them
    pub(crate) fn cancel_after(mut self, name: &str, after: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((name.to_string(), after, token));
        self
    }

    pub(crate) fn stats(&self) -> Arc<CursorStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn list_collection_names(&self) -> Result<Vec<String>> {
        Ok(self.collections.keys().cloned().collect())
    }

    async fn count_documents(&self, collection: &str) -> Result<u64> {
        tokio::task::yield_now().await;
        if self.stalling_counts.contains(collection) {
            std::future::pending::<()>().await;
        }
        if self.failing_counts.contains(collection) {
            return Err(ExporterError::Generic(format!("count failed for {collection}")));
        }
        self.collections
            .get(collection)
            .map(|docs| docs.len() as u64)
            .ok_or_else(|| ExporterError::Generic(format!("no collection {collection}")))
    }

    async fn open_cursor(
        &self,
        collection: &str,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>> {
        let docs = self
            .collections
            .get(collection)
            .cloned()
            .ok_or_else(|| ExporterError::Generic(format!("no collection {collection}")))?;

        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(active, Ordering::SeqCst);
        self.stats.opened.fetch_add(1, Ordering::SeqCst);

        let cancel = self
            .cancel_after
            .as_ref()
            .filter(|(name, _, _)| name == collection)
            .map(|(_, after, token)| (*after, token.clone()));

        Ok(Box::new(MemoryCursor {
            docs: docs.into(),
            batch_size: batch_size.max(1) as usize,
            yielded: 0,
            fail_after: self.failing_cursors.get(collection).copied(),
            stall_after: self.stalling_cursors.get(collection).copied(),
            fail_close: self.failing_closes.contains(collection),
            cancel,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MemoryCursor {
    docs: VecDeque<Document>,
    batch_size: usize,
    yielded: usize,
    fail_after: Option<usize>,
    stall_after: Option<usize>,
    fail_close: bool,
    cancel: Option<(usize, CancellationToken)>,
    stats: Arc<CursorStats>,
}

#[async_trait]
impl StreamingQuery for MemoryCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        tokio::task::yield_now().await;

        if let Some((after, token)) = &self.cancel {
            if self.yielded >= *after {
                token.cancel();
            }
        }
        if let Some(after) = self.fail_after {
            if self.yielded >= after {
                return Err(ExporterError::Generic("cursor died".to_string()));
            }
        }

        if let Some(after) = self.stall_after {
            if self.yielded >= after {
                std::future::pending::<()>().await;
            }
        }

        let mut take = self.batch_size.min(self.docs.len());
        for after in [self.fail_after, self.stall_after].into_iter().flatten() {
            take = take.min(after - self.yielded);
        }
        if let Some((after, _)) = &self.cancel {
            if self.yielded < *after {
                take = take.min(after - self.yielded);
            }
        }
        if take == 0 {
            return Ok(None);
        }

        let batch: Vec<Document> = self.docs.drain(..take).collect();
        self.yielded += batch.len();
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        self.docs.clear();
        if self.fail_close {
            return Err(ExporterError::Generic("killCursors failed".to_string()));
        }
        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}
