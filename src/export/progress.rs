//! Progress aggregation across concurrently exporting collections
//!
//! Every worker reports into one [`ProgressAggregator`]. All counters,
//! including the running sums behind the overall percentage, sit behind a
//! single mutex so a snapshot can never pair a fresh processed count with a
//! stale total.
//!
//! When an [`EventSink`] is attached, each snapshot is published while the
//! lock is still held. The event stream is therefore in the same order as the
//! counter updates, and since every total is registered before the first
//! advance, the overall percentage it carries never goes down.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::events::{EventSink, ExportEvent, ProgressSnapshot};
use crate::error::{ExportError, Result};

#[derive(Debug, Default, Clone, Copy)]
struct Counter {
    total: u64,
    processed: u64,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Counter>,
    total_sum: u64,
    processed_sum: u64,
}

impl State {
    fn overall_percent(&self) -> f64 {
        percent(self.processed_sum, self.total_sum)
    }

    fn snapshot(&self, collection: &str, counter: Counter) -> ProgressSnapshot {
        ProgressSnapshot {
            overall_percent: self.overall_percent(),
            collection: collection.to_string(),
            processed: counter.processed,
            total: counter.total,
            collection_percent: percent(counter.processed, counter.total),
        }
    }
}

/// Thread-safe store of per-collection (processed, total) counters
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    state: Mutex<State>,
    sink: Option<EventSink>,
}

impl ProgressAggregator {
    /// Create an aggregator that only keeps counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an aggregator that also publishes every snapshot to `sink`
    pub fn with_sink(sink: EventSink) -> Self {
        Self {
            state: Mutex::default(),
            sink: Some(sink),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Counters are plain integers; a panicked holder cannot leave them torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the document total of a collection
    ///
    /// Must happen exactly once per collection, before any [`advance`](Self::advance).
    pub fn register(&self, collection: &str, total: u64) -> Result<()> {
        let mut state = self.lock();
        if state.collections.contains_key(collection) {
            return Err(ExportError::DuplicateRegistration(collection.to_string()).into());
        }
        state.collections.insert(
            collection.to_string(),
            Counter {
                total,
                processed: 0,
            },
        );
        state.total_sum += total;
        trace!("Registered '{}' with {} documents", collection, total);
        Ok(())
    }

    /// Add `delta` processed documents to a collection and return the new snapshot
    ///
    /// The processed count saturates at the registered total, so documents
    /// inserted after counting never push a collection past 100%.
    pub fn advance(&self, collection: &str, delta: u64) -> Result<ProgressSnapshot> {
        let mut state = self.lock();
        let counter = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| ExportError::UnknownCollection(collection.to_string()))?;

        let before = counter.processed;
        counter.processed = before.saturating_add(delta).min(counter.total);
        let applied = counter.processed - before;
        let counter = *counter;
        state.processed_sum += applied;

        let snapshot = state.snapshot(collection, counter);
        if let Some(sink) = &self.sink {
            // A dropped receiver only means nobody is watching
            let _ = sink.send(ExportEvent::Progress(snapshot.clone()));
        }
        Ok(snapshot)
    }

    /// Overall completion percentage across every registered collection
    pub fn overall_percent(&self) -> f64 {
        self.lock().overall_percent()
    }

    /// Current snapshot of one collection, if registered
    pub fn snapshot(&self, collection: &str) -> Option<ProgressSnapshot> {
        let state = self.lock();
        let counter = *state.collections.get(collection)?;
        Some(state.snapshot(collection, counter))
    }

    /// (Σ processed, Σ total) read atomically
    pub fn totals(&self) -> (u64, u64) {
        let state = self.lock();
        (state.processed_sum, state.total_sum)
    }
}

fn percent(processed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExporterError;
    use crate::export::events::event_channel;

    #[test]
    fn test_register_then_advance() {
        let aggregator = ProgressAggregator::new();
        aggregator.register("users", 4).unwrap();
        aggregator.register("orders", 6).unwrap();

        let snap = aggregator.advance("users", 2).unwrap();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.total, 4);
        assert!((snap.collection_percent - 50.0).abs() < 1e-9);
        assert!((snap.overall_percent - 20.0).abs() < 1e-9);
        assert_eq!(aggregator.totals(), (2, 10));
    }

    #[test]
    fn test_advance_unregistered_fails() {
        let aggregator = ProgressAggregator::new();
        let err = aggregator.advance("ghost", 1).unwrap_err();
        assert!(matches!(
            err,
            ExporterError::Export(ExportError::UnknownCollection(ref name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_double_registration_fails() {
        let aggregator = ProgressAggregator::new();
        aggregator.register("users", 1).unwrap();
        assert!(aggregator.register("users", 1).is_err());
        assert_eq!(aggregator.totals(), (0, 1));
    }

    #[test]
    fn test_processed_never_exceeds_total() {
        let aggregator = ProgressAggregator::new();
        aggregator.register("logs", 3).unwrap();
        aggregator.advance("logs", 2).unwrap();
        let snap = aggregator.advance("logs", 5).unwrap();
        assert_eq!(snap.processed, 3);
        assert_eq!(aggregator.totals(), (3, 3));
        assert!((aggregator.overall_percent() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_aggregator_is_zero_percent() {
        let aggregator = ProgressAggregator::new();
        assert_eq!(aggregator.overall_percent(), 0.0);
        aggregator.register("empty", 0).unwrap();
        assert_eq!(aggregator.overall_percent(), 0.0);
        assert!(aggregator.snapshot("empty").is_some());
        assert!(aggregator.snapshot("missing").is_none());
    }

    #[test]
    fn test_concurrent_advances_stay_consistent() {
        let (sink, mut stream) = event_channel();
        let aggregator = ProgressAggregator::with_sink(sink);
        let names: Vec<String> = (0..8).map(|i| format!("c{i}")).collect();
        for name in &names {
            aggregator.register(name, 1_000).unwrap();
        }

        std::thread::scope(|scope| {
            for name in &names {
                let aggregator = &aggregator;
                scope.spawn(move || {
                    for _ in 0..100 {
                        aggregator.advance(name, 10).unwrap();
                    }
                });
            }
        });

        assert_eq!(aggregator.totals(), (8_000, 8_000));

        // Published snapshots arrive in lock order: overall never decreases
        let mut last = 0.0;
        let mut seen = 0;
        while let Ok(ExportEvent::Progress(snap)) = stream.try_recv() {
            assert!(snap.overall_percent >= last);
            assert!(snap.processed <= snap.total);
            last = snap.overall_percent;
            seen += 1;
        }
        assert_eq!(seen, 800);
        assert!((last - 100.0).abs() < 1e-9);
    }
}
