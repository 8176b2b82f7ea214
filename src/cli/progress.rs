//! Terminal rendering of export events
//!
//! Consumes the engine's event stream and draws one bar for overall document
//! progress and, once archiving starts, one bar for the zip step. With bars
//! disabled the same events are only logged.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::export::{ArchiveProgress, CollectionOutcome, EventStream, ExportEvent, ProgressSnapshot};

/// Bar positions per percent, so fractional percentages still move the bar
const STEPS_PER_PERCENT: u64 = 100;
const BAR_LENGTH: u64 = 100 * STEPS_PER_PERCENT;

/// Progress renderer for one export run
pub struct ProgressRenderer {
    /// Draw target shared by both bars
    multi: MultiProgress,
    /// Overall document progress (None when bars are disabled)
    overall: Option<ProgressBar>,
    /// Archive progress, created on the first archive event
    archive: Option<ProgressBar>,
    /// Whether bars are drawn at all
    enabled: bool,
}

impl ProgressRenderer {
    /// Create a new renderer
    ///
    /// # Arguments
    /// * `enabled` - Whether to draw progress bars
    pub fn new(enabled: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = enabled.then(|| {
            let bar = multi.add(ProgressBar::new(BAR_LENGTH));
            bar.set_style(bar_style("{spinner:.green} export  [{bar:40.cyan/blue}] {msg}"));
            bar
        });

        Self {
            multi,
            overall,
            archive: None,
            enabled,
        }
    }

    /// Apply one event to the display
    pub fn handle(&mut self, event: &ExportEvent) {
        match event {
            ExportEvent::Progress(snapshot) => self.on_progress(snapshot),
            ExportEvent::Archive(progress) => self.on_archive(progress),
            ExportEvent::CollectionFinished {
                collection,
                outcome,
            } => self.on_collection(collection, outcome),
        }
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        debug!(
            "{}: {}/{} ({:.1}%), overall {:.1}%",
            snapshot.collection,
            snapshot.processed,
            snapshot.total,
            snapshot.collection_percent,
            snapshot.overall_percent
        );
        if let Some(bar) = &self.overall {
            bar.set_position(to_position(snapshot.overall_percent));
            bar.set_message(format!(
                "{:.1}% | {} {}/{}",
                snapshot.overall_percent, snapshot.collection, snapshot.processed, snapshot.total
            ));
        }
    }

    fn on_archive(&mut self, progress: &ArchiveProgress) {
        debug!("Archived {} ({:.1}%)", progress.file_name, progress.percent);
        if !self.enabled {
            return;
        }
        let multi = &self.multi;
        let bar = self.archive.get_or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(BAR_LENGTH));
            bar.set_style(bar_style("{spinner:.green} archive [{bar:40.green/white}] {msg}"));
            bar
        });
        bar.set_position(to_position(progress.percent));
        bar.set_message(format!("{:.1}% | {}", progress.percent, progress.file_name));
    }

    fn on_collection(&self, collection: &str, outcome: &CollectionOutcome) {
        let line = match outcome {
            CollectionOutcome::Exported { documents } => {
                info!("Exported {} documents from '{}'", documents, collection);
                return;
            }
            CollectionOutcome::Skipped => {
                debug!("Skipped empty collection '{}'", collection);
                return;
            }
            CollectionOutcome::Cancelled { documents } => {
                format!("'{collection}' cancelled after {documents} documents")
            }
            CollectionOutcome::Failed { message } => format!("'{collection}' failed: {message}"),
        };

        warn!("{}", line);
        if self.enabled {
            let _ = self.multi.println(line);
        }
    }

    /// Clear every bar from the terminal
    pub fn finish(&self) {
        if let Some(bar) = &self.overall {
            bar.finish_and_clear();
        }
        if let Some(bar) = &self.archive {
            bar.finish_and_clear();
        }
    }
}

/// Render `events` on a background task until the stream closes
pub fn spawn_renderer(mut events: EventStream, enabled: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = ProgressRenderer::new(enabled);
        while let Some(event) = events.recv().await {
            renderer.handle(&event);
        }
        renderer.finish();
    })
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn to_position(percent: f64) -> u64 {
    let clamped = percent.clamp(0.0, 100.0);
    (clamped * STEPS_PER_PERCENT as f64).round() as u64
}
