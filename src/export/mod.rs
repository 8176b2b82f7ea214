//! Whole-database export engine
//!
//! This module exports every collection of a database into its own
//! extended-JSON file and packages the run into one zip archive.
//!
//! # Architecture
//!
//! 1. **ExportCoordinator**: enumerates collections and fans out one task per
//!    collection on a bounded worker pool, then joins them all
//! 2. **ProgressAggregator**: single-lock store of per-collection counters
//!    that publishes consistent progress snapshots
//! 3. **CollectionExport / DocumentWriter**: stream one cursor into one file
//! 4. **ArchiveBuilder**: zips the finished run directory with per-file progress
//! 5. **cancel**: cooperative cancellation and per-operation deadlines
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mongo_exporter::export::{ExportCoordinator, ExportJob, ExportOptions, event_channel};
//! use mongo_exporter::source::MongoSource;
//!
//! # async fn example(database: mongodb::Database) {
//! let (sink, mut events) = event_channel();
//! let coordinator = ExportCoordinator::new(Arc::new(MongoSource::new(database)), ExportOptions::default())
//!     .with_events(sink);
//!
//! let job = ExportJob::new("mongodb://localhost:27017", "shop", "/backups");
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//! println!("{}", coordinator.run(&job).await);
//! # }
//! ```

use std::time::Duration;

pub mod archive;
pub mod cancel;
pub mod coordinator;
pub mod events;
pub mod job;
pub mod progress;
pub mod writer;


pub use archive::{ArchiveBuilder, ArchiveEntry, ArchiveObserver, ArchiveOutcome};
pub use coordinator::ExportCoordinator;
pub use events::{
    ArchiveProgress, CollectionOutcome, EventSink, EventStream, ExportEvent, ProgressSnapshot,
    TerminalEvent, event_channel,
};
pub use job::ExportJob;
pub use progress::ProgressAggregator;
pub use writer::{CollectionExport, DocumentWriter};

/// Documents pulled from the cursor per round-trip
pub const DEFAULT_BATCH_SIZE: u32 = 10_000;

/// Collections exported at the same time
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tunables of the export engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Cursor batch size, also the progress reporting interval
    pub batch_size: u32,
    /// Size of the worker pool
    pub concurrency: usize,
    /// Deadline applied to every individual database call: listing,
    /// each count, opening each cursor and each batch fetch
    pub operation_timeout: Option<Duration>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            operation_timeout: None,
        }
    }
}
