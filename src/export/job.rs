//! Export job description and output path layout

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

/// Date format of run directory names (`DD-MM-YYYY`)
pub const RUN_DATE_FORMAT: &str = "%d-%m-%Y";

/// One export run
///
/// Immutable once built. The run date defaults to today's local date, so two
/// runs on different days land in different run directories.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Opaque connection target, only used for logging by the engine
    pub connection_target: String,
    /// Database being exported
    pub database: String,
    /// Directory under which the dated run directory is created
    pub base_output_dir: PathBuf,
    run_date: NaiveDate,
}

impl ExportJob {
    pub fn new(
        connection_target: impl Into<String>,
        database: impl Into<String>,
        base_output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connection_target: connection_target.into(),
            database: database.into(),
            base_output_dir: base_output_dir.into(),
            run_date: Local::now().date_naive(),
        }
    }

    /// Pin the run date instead of using today's date
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    /// `<base_output_dir>/<DD-MM-YYYY>`
    pub fn run_directory(&self) -> PathBuf {
        self.base_output_dir
            .join(self.run_date.format(RUN_DATE_FORMAT).to_string())
    }

    /// `<run_directory>.zip`
    pub fn archive_path(&self) -> PathBuf {
        archive_path_for(&self.run_directory())
    }

    /// `<run_directory>/<database>_<collection>.json`
    ///
    /// The collection part goes through [`escape_file_component`], so names
    /// such as `logs/2024` stay inside the run directory.
    pub fn collection_file(&self, collection: &str) -> PathBuf {
        self.run_directory().join(format!(
            "{}_{}.json",
            self.database,
            escape_file_component(collection)
        ))
    }
}

/// Percent-encode characters that are not allowed in a file name
///
/// `%` is encoded as well, which keeps the mapping injective: two distinct
/// collection names never share an output file.
pub fn escape_file_component(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {
                escaped.push_str(&format!("%{:02X}", c as u32))
            }
            c if c.is_control() => escaped.push_str(&format!("%{:02X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Archive path for a run directory: the directory name with `.zip` appended
pub fn archive_path_for(run_directory: &Path) -> PathBuf {
    let mut name = run_directory.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ExportJob {
        ExportJob::new("mongodb://localhost", "shop", "/backups")
            .with_run_date(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap())
    }

    #[test]
    fn test_run_directory_layout() {
        let job = job();
        assert_eq!(job.run_directory(), PathBuf::from("/backups/07-03-2026"));
        assert_eq!(job.archive_path(), PathBuf::from("/backups/07-03-2026.zip"));
        assert_eq!(
            job.collection_file("users"),
            PathBuf::from("/backups/07-03-2026/shop_users.json")
        );
    }

    #[test]
    fn test_collection_names_with_separators() {
        let job = job();
        assert_eq!(
            job.collection_file("logs/2024"),
            PathBuf::from("/backups/07-03-2026/shop_logs%2F2024.json")
        );
        assert_eq!(escape_file_component("a\\b:c"), "a%5Cb%3Ac");
        assert_eq!(escape_file_component("system.views"), "system.views");
    }

    #[test]
    fn test_escaped_names_stay_distinct() {
        let names = ["logs/2024", "logs%2F2024", "logs_2024", "logs%252F2024"];
        let mut files: Vec<String> = names.iter().map(|n| escape_file_component(n)).collect();
        files.sort();
        files.dedup();
        assert_eq!(files.len(), names.len());
    }

    #[test]
    fn test_different_dates_do_not_collide() {
        let first = job();
        let second = job().with_run_date(NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
        assert_ne!(first.run_directory(), second.run_directory());
        assert_ne!(first.archive_path(), second.archive_path());
    }

    #[test]
    fn test_default_run_date_is_local_date() {
        let before = Local::now().date_naive();
        let job = ExportJob::new("uri", "db", "/out");
        assert!(job.run_date() >= before);
        assert!(job.run_date() <= Local::now().date_naive());
    }
}
