//! Events pushed from the export engine to its caller
//!
//! Progress and archive events stream through an unbounded channel while the
//! run is in flight. The single [`TerminalEvent`] is the return value of
//! [`ExportCoordinator::run`](super::ExportCoordinator::run).

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

/// Sending half of the event channel
pub type EventSink = mpsc::UnboundedSender<ExportEvent>;

/// Receiving half of the event channel
pub type EventStream = mpsc::UnboundedReceiver<ExportEvent>;

/// Create a connected event sink/stream pair
pub fn event_channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Point-in-time read of the progress aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Σ processed / Σ total × 100 over every registered collection
    pub overall_percent: f64,
    /// Collection whose counter produced this snapshot
    pub collection: String,
    /// Documents processed in that collection
    pub processed: u64,
    /// Documents counted in that collection
    pub total: u64,
    /// processed / total × 100 for that collection
    pub collection_percent: f64,
}

/// Archive progress, emitted once per archived file
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveProgress {
    /// Files archived so far / files in the whole run directory × 100
    pub percent: f64,
    /// Path of the file just added, relative to the run directory
    pub file_name: String,
}

/// How a single collection's export ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Every document was written
    Exported { documents: u64 },
    /// The collection was empty; no file was produced
    Skipped,
    /// The cancellation token fired; the partial file is kept
    Cancelled { documents: u64 },
    /// Counting or streaming failed
    Failed { message: String },
}

impl CollectionOutcome {
    /// Severity used to derive the job outcome (higher is worse)
    pub(crate) fn severity(&self) -> u8 {
        match self {
            CollectionOutcome::Exported { .. } | CollectionOutcome::Skipped => 0,
            CollectionOutcome::Cancelled { .. } => 1,
            CollectionOutcome::Failed { .. } => 2,
        }
    }
}

/// Non-terminal event streamed to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    /// Document progress at a batch boundary
    Progress(ProgressSnapshot),
    /// Per-file archive progress
    Archive(ArchiveProgress),
    /// A collection worker reached a terminal state
    CollectionFinished {
        collection: String,
        outcome: CollectionOutcome,
    },
}

/// The single outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Every collection was exported and archived
    Success { archive_path: PathBuf },
    /// The database had no collections; nothing was written
    NoCollections,
    /// The run was cancelled
    Aborted,
    /// Setup, a collection, or the archive step failed
    Error { message: String },
}

impl TerminalEvent {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalEvent::Success { .. })
    }
}

impl fmt::Display for TerminalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalEvent::Success { archive_path } => write!(
                f,
                "Export completed successfully! Zipped at: {}",
                archive_path.display()
            ),
            TerminalEvent::NoCollections => write!(f, "No collections found in the database."),
            TerminalEvent::Aborted => write!(f, "Export aborted by user."),
            TerminalEvent::Error { message } => write!(f, "Export failed: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_severity_order() {
        let exported = CollectionOutcome::Exported { documents: 3 };
        let cancelled = CollectionOutcome::Cancelled { documents: 1 };
        let failed = CollectionOutcome::Failed {
            message: "x".into(),
        };
        assert_eq!(exported.severity(), CollectionOutcome::Skipped.severity());
        assert!(cancelled.severity() > exported.severity());
        assert!(failed.severity() > cancelled.severity());
    }

    #[test]
    fn test_terminal_messages() {
        assert_eq!(
            TerminalEvent::NoCollections.to_string(),
            "No collections found in the database."
        );
        assert_eq!(TerminalEvent::Aborted.to_string(), "Export aborted by user.");
        let success = TerminalEvent::Success {
            archive_path: PathBuf::from("/tmp/19-10-2026.zip"),
        };
        assert!(success.is_success());
        assert!(success.to_string().ends_with("/tmp/19-10-2026.zip"));
    }
}
