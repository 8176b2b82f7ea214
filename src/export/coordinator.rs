//! Export coordinator for whole-database runs
//!
//! Brings together the document source, the progress aggregator, the
//! per-collection writers and the archive builder:
//!
//! 1. Create the dated run directory
//! 2. Enumerate collections
//! 3. Count and register every collection on the worker pool
//! 4. Export every non-empty collection on the worker pool
//! 5. Join every task, derive the worst-case outcome
//! 6. Archive the run directory if, and only if, every collection succeeded

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ExportOptions;
use super::archive::{ArchiveBuilder, ArchiveOutcome};
use super::cancel::{ensure_active, guarded};
use super::events::{CollectionOutcome, EventSink, ExportEvent, TerminalEvent};
use super::job::ExportJob;
use super::progress::ProgressAggregator;
use super::writer::CollectionExport;
use crate::error::{ExportError, ExporterError, Result};
use crate::source::DocumentSource;

/// Coordinator for export runs
///
/// One coordinator can drive several runs; each run gets a fresh progress
/// aggregator but shares the coordinator's cancellation token.
pub struct ExportCoordinator {
    /// Database being exported
    source: Arc<dyn DocumentSource>,
    /// Tunables (batch size, pool size, deadline)
    options: ExportOptions,
    /// Cancellation token for aborting the run
    token: CancellationToken,
    /// Where progress events go, if anyone listens
    sink: Option<EventSink>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(source: Arc<dyn DocumentSource>, options: ExportOptions) -> Self {
        Self {
            source,
            options,
            token: CancellationToken::new(),
            sink: None,
        }
    }

    /// Set cancellation token for this coordinator
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Stream progress, archive and per-collection events to `sink`
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Execute one export run
    ///
    /// Never fails: setup, collection and archive errors all become
    /// [`TerminalEvent::Error`], cancellation becomes [`TerminalEvent::Aborted`].
    pub async fn run(&self, job: &ExportJob) -> TerminalEvent {
        let start_time = Instant::now();
        info!(
            "Starting export of database '{}' into {}",
            job.database,
            job.run_directory().display()
        );

        let terminal = match self.execute(job).await {
            Ok(terminal) => terminal,
            Err(e) if e.is_cancelled() => TerminalEvent::Aborted,
            Err(e) => {
                error!("Export of '{}' failed: {}", job.database, e);
                TerminalEvent::Error {
                    message: e.to_string(),
                }
            }
        };

        info!(
            "Export of '{}' finished in {} ms: {}",
            job.database,
            start_time.elapsed().as_millis(),
            terminal
        );
        terminal
    }

    async fn execute(&self, job: &ExportJob) -> Result<TerminalEvent> {
        let run_directory = job.run_directory();
        tokio::fs::create_dir_all(&run_directory).await?;
        ensure_active(&self.token)?;

        let names = guarded(
            &self.token,
            self.options.operation_timeout,
            "listCollections",
            self.source.list_collection_names(),
        )
        .await?;

        if names.is_empty() {
            info!("No collections found in database '{}'", job.database);
            return Ok(TerminalEvent::NoCollections);
        }
        info!("Found {} collections", names.len());

        let aggregator = Arc::new(match &self.sink {
            Some(sink) => ProgressAggregator::with_sink(sink.clone()),
            None => ProgressAggregator::new(),
        });
        let mut outcomes = BTreeMap::new();

        // Every total is registered before the first document is exported,
        // which keeps the overall percentage monotonic.
        let mut pending = Vec::new();
        for (name, counted) in self.count_all(names).await {
            match counted {
                Ok(total) => {
                    aggregator.register(&name, total)?;
                    if total == 0 {
                        debug!("Collection '{}' is empty, skipping", name);
                        self.record(&mut outcomes, name, CollectionOutcome::Skipped);
                    } else {
                        pending.push(name);
                    }
                }
                Err(e) => {
                    let outcome = self.failure_outcome(&name, e, &aggregator);
                    self.record(&mut outcomes, name, outcome);
                }
            }
        }

        for (name, exported) in self.export_all(job, pending, &aggregator).await {
            let outcome = match exported {
                Ok(outcome) => outcome,
                Err(e) => self.failure_outcome(&name, e, &aggregator),
            };
            self.record(&mut outcomes, name, outcome);
        }

        let (processed, total) = aggregator.totals();
        info!(
            "All collection tasks finished: {}/{} documents",
            processed, total
        );

        self.conclude(job, outcomes).await
    }

    /// Count every collection, at most `concurrency` at a time
    async fn count_all(&self, names: Vec<String>) -> Vec<(String, Result<u64>)> {
        let source = Arc::clone(&self.source);
        let deadline = self.options.operation_timeout;
        let token = self.token.clone();

        self.run_bounded(names, move |name| {
            let source = Arc::clone(&source);
            let token = token.clone();
            async move {
                let operation = format!("count_documents({name})");
                guarded(&token, deadline, &operation, source.count_documents(&name)).await
            }
        })
        .await
    }

    /// Export every collection in `names`, at most `concurrency` at a time
    async fn export_all(
        &self,
        job: &ExportJob,
        names: Vec<String>,
        aggregator: &Arc<ProgressAggregator>,
    ) -> Vec<(String, Result<CollectionOutcome>)> {
        let source = Arc::clone(&self.source);
        let aggregator = Arc::clone(aggregator);
        let token = self.token.clone();
        let deadline = self.options.operation_timeout;
        let batch_size = self.options.batch_size;
        let job = job.clone();

        self.run_bounded(names, move |name| {
            let source = Arc::clone(&source);
            let aggregator = Arc::clone(&aggregator);
            let token = token.clone();
            let path = job.collection_file(&name);
            async move {
                let operation = format!("find({name})");
                let cursor = guarded(
                    &token,
                    deadline,
                    &operation,
                    source.open_cursor(&name, batch_size),
                )
                .await?;

                CollectionExport {
                    collection: &name,
                    path,
                    aggregator: aggregator.as_ref(),
                    token: &token,
                    deadline,
                }
                .run(cursor)
                .await
            }
        })
        .await
    }

    /// Run one task per name on a pool of `concurrency` permits
    ///
    /// Tasks past the limit queue on the semaphore. The token is checked
    /// before each spawn and again once a permit is held. Panics are caught
    /// and turned into [`ExportError::TaskFailed`] so every name yields
    /// exactly one result.
    async fn run_bounded<T, F, Fut>(&self, names: Vec<String>, work: F) -> Vec<(String, Result<T>)>
    where
        T: Send + 'static,
        F: Fn(String) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut results = Vec::with_capacity(names.len());

        for name in names {
            if self.token.is_cancelled() {
                results.push((name, Err(ExportError::Cancelled.into())));
                continue;
            }

            let permits = Arc::clone(&permits);
            let token = self.token.clone();
            let task = work(name.clone());

            tasks.spawn(async move {
                let guarded_task = async {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| ExportError::TaskFailed(e.to_string()))?;
                    ensure_active(&token)?;
                    task.await
                };
                let result = AssertUnwindSafe(guarded_task)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(ExportError::TaskFailed(format!("worker for '{name}' panicked")).into())
                    });
                (name, result)
            });
        }

        // Barrier: nothing downstream runs until every task is terminal
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    error!("Worker task ended abnormally: {}", e);
                    results.push((
                        "<unknown>".to_string(),
                        Err(ExportError::TaskFailed(e.to_string()).into()),
                    ));
                }
            }
        }

        results
    }

    fn failure_outcome(
        &self,
        name: &str,
        error: ExporterError,
        aggregator: &ProgressAggregator,
    ) -> CollectionOutcome {
        if error.is_cancelled() {
            let documents = aggregator
                .snapshot(name)
                .map(|snapshot| snapshot.processed)
                .unwrap_or(0);
            CollectionOutcome::Cancelled { documents }
        } else {
            warn!("Collection '{}' failed: {}", name, error);
            CollectionOutcome::Failed {
                message: error.to_string(),
            }
        }
    }

    fn record(
        &self,
        outcomes: &mut BTreeMap<String, CollectionOutcome>,
        name: String,
        outcome: CollectionOutcome,
    ) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(ExportEvent::CollectionFinished {
                collection: name.clone(),
                outcome: outcome.clone(),
            });
        }
        outcomes.insert(name, outcome);
    }

    /// Derive the terminal event from the worst collection outcome
    async fn conclude(
        &self,
        job: &ExportJob,
        outcomes: BTreeMap<String, CollectionOutcome>,
    ) -> Result<TerminalEvent> {
        let failures: Vec<String> = outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                CollectionOutcome::Failed { message } => Some(format!("{name}: {message}")),
                _ => None,
            })
            .collect();

        if !failures.is_empty() {
            return Ok(TerminalEvent::Error {
                message: format!(
                    "{} of {} collections failed: {}",
                    failures.len(),
                    outcomes.len(),
                    failures.join("; ")
                ),
            });
        }

        let worst = outcomes.values().map(CollectionOutcome::severity).max();
        if worst > Some(0) || self.token.is_cancelled() {
            return Ok(TerminalEvent::Aborted);
        }

        let mut builder = ArchiveBuilder::new(self.token.clone());
        if let Some(sink) = &self.sink {
            builder = builder.with_sink(sink.clone());
        }

        match builder.build_async(job.run_directory()).await? {
            ArchiveOutcome::Completed { path, files } => {
                info!("Archived {} files into {}", files, path.display());
                Ok(TerminalEvent::Success { archive_path: path })
            }
            ArchiveOutcome::Cancelled { .. } => Ok(TerminalEvent::Aborted),
        }
    }
}
