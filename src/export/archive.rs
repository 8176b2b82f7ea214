//! Packaging of a finished run directory into one zip archive
//!
//! The tree is walked once up front to collect every regular file, so the
//! reported progress is a true fraction of the whole run directory rather
//! than of the directory currently being visited.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::events::{ArchiveProgress, EventSink, ExportEvent};
use super::job::archive_path_for;
use crate::error::{ExportError, ExporterError, Result};

/// A file found under the run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Absolute (or caller-relative) path on disk
    pub path: PathBuf,
    /// `/`-separated path inside the archive
    pub relative: String,
}

/// How an archive build ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Every file was added
    Completed { path: PathBuf, files: usize },
    /// The token fired; the archive on disk holds only the files added so far
    Cancelled { path: PathBuf, files: usize },
}

/// Collect every regular file under `root`, in a stable order
pub fn collect_entries(root: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ExporterError::Generic(format!("{}: {e}", entry.path().display())))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(ArchiveEntry {
            path: entry.into_path(),
            relative,
        });
    }
    Ok(entries)
}

/// Callback invoked after each archived file
pub type ArchiveObserver = Box<dyn Fn(&ArchiveProgress) + Send>;

/// Builds `<run_directory>.zip` with deflate compression
pub struct ArchiveBuilder {
    token: CancellationToken,
    observer: Option<ArchiveObserver>,
}

impl ArchiveBuilder {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            observer: None,
        }
    }

    /// Publish an [`ArchiveProgress`] event per archived file
    pub fn with_sink(self, sink: EventSink) -> Self {
        self.on_progress(move |progress| {
            // A dropped receiver only means nobody is watching
            let _ = sink.send(ExportEvent::Archive(progress.clone()));
        })
    }

    /// Call `observer` after each archived file, on the archiving thread
    pub fn on_progress(mut self, observer: impl Fn(&ArchiveProgress) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Archive `run_directory` on the blocking thread pool
    pub async fn build_async(self, run_directory: PathBuf) -> Result<ArchiveOutcome> {
        tokio::task::spawn_blocking(move || self.build(&run_directory))
            .await
            .map_err(|e| ExportError::TaskFailed(format!("archive builder: {e}")))?
    }

    /// Archive `run_directory` into `<run_directory>.zip`
    ///
    /// The token is checked before each file. On cancellation the archive is
    /// finished with whatever was added and left on disk.
    pub fn build(&self, run_directory: &Path) -> Result<ArchiveOutcome> {
        let archive_path = archive_path_for(run_directory);
        let entries = collect_entries(run_directory)?;
        let total = entries.len();
        info!(
            "Archiving {} files from {} into {}",
            total,
            run_directory.display(),
            archive_path.display()
        );

        let mut zip = ZipWriter::new(File::create(&archive_path)?);
        let mut archived = 0usize;

        for entry in &entries {
            if self.token.is_cancelled() {
                zip.finish()?;
                info!("Archiving cancelled after {} of {} files", archived, total);
                return Ok(ArchiveOutcome::Cancelled {
                    path: archive_path,
                    files: archived,
                });
            }

            add_file(&mut zip, entry)?;
            archived += 1;
            debug!("Archived {} ({}/{})", entry.relative, archived, total);

            if let Some(observer) = &self.observer {
                observer(&ArchiveProgress {
                    percent: archived as f64 / total as f64 * 100.0,
                    file_name: entry.relative.clone(),
                });
            }
        }

        zip.finish()?;
        info!("Archive written to {}", archive_path.display());
        Ok(ArchiveOutcome::Completed {
            path: archive_path,
            files: archived,
        })
    }
}

fn add_file(zip: &mut ZipWriter<File>, entry: &ArchiveEntry) -> Result<()> {
    let mut source = File::open(&entry.path)?;
    let size = source.metadata()?.len();
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(size >= u32::MAX as u64);

    zip.start_file(entry.relative.clone(), options)?;
    io::copy(&mut source, zip)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::events::event_channel;
    use std::io::Read;

    fn populate(root: &Path) {
        std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
        std::fs::write(root.join("db_a.json"), b"{\"a\": 1}\n").unwrap();
        std::fs::write(root.join("db_b.json"), b"{\"b\": 2}\n").unwrap();
        std::fs::write(root.join("nested/c.json"), b"{\"c\": 3}\n").unwrap();
        std::fs::write(root.join("nested/deeper/d.json"), vec![b'x'; 64 * 1024]).unwrap();
    }

    #[test]
    fn test_collect_entries_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("07-03-2026");
        populate(&run);

        let names: Vec<String> = collect_entries(&run)
            .unwrap()
            .into_iter()
            .map(|e| e.relative)
            .collect();
        assert_eq!(
            names,
            vec!["db_a.json", "db_b.json", "nested/c.json", "nested/deeper/d.json"]
        );
    }

    #[test]
    fn test_archive_round_trips_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("07-03-2026");
        populate(&run);

        let outcome = ArchiveBuilder::new(CancellationToken::new())
            .build(&run)
            .unwrap();
        let path = match outcome {
            ArchiveOutcome::Completed { path, files } => {
                assert_eq!(files, 4);
                path
            }
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(path, dir.path().join("07-03-2026.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 4);
        for entry in collect_entries(&run).unwrap() {
            let mut stored = Vec::new();
            archive
                .by_name(&entry.relative)
                .unwrap()
                .read_to_end(&mut stored)
                .unwrap();
            assert_eq!(stored, std::fs::read(&entry.path).unwrap());
        }
    }

    #[test]
    fn test_progress_spans_whole_tree() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        populate(&run);
        let (sink, mut stream) = event_channel();

        ArchiveBuilder::new(CancellationToken::new())
            .with_sink(sink)
            .build(&run)
            .unwrap();

        let mut percents = Vec::new();
        while let Ok(ExportEvent::Archive(progress)) = stream.try_recv() {
            percents.push(progress.percent);
        }
        assert_eq!(percents, vec![25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_cancelled_before_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        populate(&run);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = ArchiveBuilder::new(token).build(&run).unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Cancelled { files: 0, .. }));
    }

    #[test]
    fn test_cancelled_partway_leaves_readable_partial_archive() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        populate(&run);
        let token = CancellationToken::new();
        let canceller = token.clone();

        let outcome = ArchiveBuilder::new(token)
            .on_progress(move |progress| {
                if progress.percent >= 50.0 {
                    canceller.cancel();
                }
            })
            .build(&run)
            .unwrap();

        let path = match outcome {
            ArchiveOutcome::Cancelled { path, files } => {
                assert_eq!(files, 2);
                path
            }
            other => panic!("unexpected outcome {other:?}"),
        };
        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["db_a.json", "db_b.json"]);
    }

    #[test]
    fn test_unwritable_archive_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        populate(&run);
        std::fs::create_dir_all(archive_path_for(&run)).unwrap();

        let result = ArchiveBuilder::new(CancellationToken::new()).build(&run);
        assert!(matches!(result, Err(ExporterError::Io(_))));
    }

    #[test]
    fn test_empty_directory_gives_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        std::fs::create_dir_all(&run).unwrap();

        let outcome = ArchiveBuilder::new(CancellationToken::new())
            .build(&run)
            .unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Completed { files: 0, .. }));
    }

    #[tokio::test]
    async fn test_build_async() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        populate(&run);

        let outcome = ArchiveBuilder::new(CancellationToken::new())
            .build_async(run)
            .await
            .unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Completed { files: 4, .. }));
    }
}
