//! Per-collection document writer
//!
//! Streams one collection's cursor into one output file. Each document is
//! written as indented relaxed extended JSON followed by a newline, so the
//! file is a sequence of independently parsable JSON values (not an array)
//! and database-native types such as ObjectId and dates survive the trip.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mongodb::bson::{Bson, Document};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::cancel::guarded;
use super::events::CollectionOutcome;
use super::progress::ProgressAggregator;
use crate::error::{ExportError, Result};
use crate::source::StreamingQuery;

const WRITE_BUFFER_BYTES: usize = 1024 * 1024;

/// Serialize a document as four-space indented relaxed extended JSON
pub fn to_extended_json(doc: &Document) -> Result<Vec<u8>> {
    let value = Bson::Document(doc.clone()).into_relaxed_extjson();

    let mut buf = Vec::with_capacity(256);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| ExportError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Buffered writer for one collection file
pub struct DocumentWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl DocumentWriter {
    /// Create (or truncate) the output file
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .map_err(|e| write_failed(path, e))?;
        debug!("Created output file {}", path.display());

        Ok(Self {
            writer: BufWriter::with_capacity(WRITE_BUFFER_BYTES, file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Append one record and its trailing newline
    pub async fn write_document(&mut self, doc: &Document) -> Result<()> {
        let mut record = to_extended_json(doc)?;
        record.push(b'\n');
        self.writer
            .write_all(&record)
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered records to disk and close out the file
    pub async fn finalize(&mut self) -> Result<u64> {
        self.writer
            .flush()
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        self.writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        debug!(
            "Finalized {} ({} documents)",
            self.path.display(),
            self.written
        );
        Ok(self.written)
    }
}

fn write_failed(path: &Path, err: std::io::Error) -> ExportError {
    ExportError::WriteFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Export of one collection into its own file
///
/// The file is created lazily when the first document arrives, so a cursor
/// that yields nothing leaves nothing behind.
pub struct CollectionExport<'a> {
    pub collection: &'a str,
    pub path: PathBuf,
    pub aggregator: &'a ProgressAggregator,
    pub token: &'a CancellationToken,
    /// Limit for each `next_batch` call. One call fills one batch, which the
    /// driver normally serves with a single getMore of `batch_size`
    /// documents; very large documents can split it into several replies,
    /// so the limit must allow for a full batch.
    pub deadline: Option<Duration>,
}

impl CollectionExport<'_> {
    /// Drain `query` into the output file
    ///
    /// # Returns
    /// * `Ok(Exported)` - cursor exhausted
    /// * `Ok(Cancelled)` - token fired; the partial file is flushed and kept
    /// * `Err(..)` - cursor or write failure; the partial file is still flushed
    pub async fn run(self, mut query: Box<dyn StreamingQuery>) -> Result<CollectionOutcome> {
        let mut output: Option<DocumentWriter> = None;
        let result = self.pump(query.as_mut(), &mut output).await;

        if let Err(e) = query.close().await {
            debug!("Failed to close cursor on '{}': {}", self.collection, e);
        }
        let finalized = match output.as_mut() {
            Some(writer) => writer.finalize().await.map(|_| ()),
            None => Ok(()),
        };

        let outcome = result?;
        finalized?;

        match &outcome {
            CollectionOutcome::Exported { documents } => {
                info!("Exported {} documents from '{}'", documents, self.collection)
            }
            CollectionOutcome::Cancelled { documents } => info!(
                "Export of '{}' cancelled after {} documents",
                self.collection, documents
            ),
            _ => {}
        }
        Ok(outcome)
    }

    async fn pump(
        &self,
        query: &mut dyn StreamingQuery,
        output: &mut Option<DocumentWriter>,
    ) -> Result<CollectionOutcome> {
        let operation = format!("getMore({})", self.collection);
        let mut written = 0u64;

        loop {
            let batch = match guarded(self.token, self.deadline, &operation, query.next_batch())
                .await
            {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) if e.is_cancelled() => {
                    return Ok(CollectionOutcome::Cancelled { documents: written });
                }
                Err(e) => return Err(e),
            };

            let mut in_batch = 0u64;
            for doc in &batch {
                if self.token.is_cancelled() {
                    self.report(in_batch)?;
                    return Ok(CollectionOutcome::Cancelled {
                        documents: written + in_batch,
                    });
                }

                if output.is_none() {
                    *output = Some(DocumentWriter::create(&self.path).await?);
                }
                if let Some(writer) = output.as_mut() {
                    writer.write_document(doc).await?;
                }
                in_batch += 1;
            }

            written += in_batch;
            self.report(in_batch)?;
        }

        Ok(CollectionOutcome::Exported { documents: written })
    }

    fn report(&self, delta: u64) -> Result<()> {
        if delta > 0 {
            self.aggregator.advance(self.collection, delta)?;
        }
        Ok(())
    }
}
