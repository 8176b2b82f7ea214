//! Command-line interface for mongo-exporter
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging with arguments
//! - Rendering of export events as terminal progress bars

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::export::{ExportJob, ExportOptions, TerminalEvent};

pub mod progress;

pub use progress::spawn_renderer;

/// Export every collection of a MongoDB database into a dated zip archive
#[derive(Parser, Debug)]
#[command(
    name = "mongo-exporter",
    version,
    about = "Export a MongoDB database to extended JSON files and zip them",
    long_about = "Exports every collection of a database into <out>/<DD-MM-YYYY>/<db>_<collection>.json \
(one extended-JSON record per document) and packages the directory into <out>/<DD-MM-YYYY>.zip."
)]
pub struct CliArgs {
    /// MongoDB connection URI, passed to the driver unchanged
    #[arg(value_name = "URI")]
    pub uri: String,

    /// Database to export
    #[arg(short = 'd', long = "db", value_name = "NAME")]
    pub database: String,

    /// Base output directory; the dated run directory is created under it
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Documents fetched per cursor batch
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Collections exported at the same time
    #[arg(short = 'j', long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Deadline for each database call in seconds (0 disables it)
    #[arg(long = "op-timeout", value_name = "SECONDS")]
    pub op_timeout: Option<u64>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (no progress bars, errors and the final message only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Disable progress bars but keep logging
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Config::load_from_file(args.config_file.as_deref())?;
        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Engine options: config file values overridden by flags
    pub fn export_options(&self) -> ExportOptions {
        let mut options = self.config.export.to_options();
        if let Some(batch_size) = self.args.batch_size {
            options.batch_size = batch_size;
        }
        if let Some(concurrency) = self.args.concurrency {
            options.concurrency = concurrency as usize;
        }
        if let Some(seconds) = self.args.op_timeout {
            options.operation_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }
        options
    }

    /// The run described by the arguments
    pub fn job(&self) -> ExportJob {
        ExportJob::new(
            self.args.uri.clone(),
            self.args.database.clone(),
            self.args.output_dir.clone(),
        )
    }

    /// Whether progress bars should be drawn
    pub fn show_progress(&self) -> bool {
        !self.args.quiet && !self.args.no_progress
    }

    /// Log level from flags, falling back to the config file
    ///
    /// `-q` wins over `-v`/`--vv` and caps logging at errors.
    pub fn log_level(&self) -> tracing::Level {
        if self.args.quiet {
            tracing::Level::ERROR
        } else if self.args.very_verbose {
            tracing::Level::TRACE
        } else if self.args.verbose {
            tracing::Level::DEBUG
        } else {
            self.config.logging.level.to_tracing_level()
        }
    }
}

/// Process exit code for a terminal event
pub fn exit_code(terminal: &TerminalEvent) -> i32 {
    match terminal {
        TerminalEvent::Success { .. } | TerminalEvent::NoCollections => 0,
        TerminalEvent::Aborted => 130,
        TerminalEvent::Error { .. } => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> CliArgs {
        let mut argv = vec![
            "mongo-exporter",
            "mongodb://localhost:27017",
            "--db",
            "shop",
            "--out",
            "/backups",
            "--config",
            "/nonexistent/mongo-exporter.toml",
        ];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_required_arguments() {
        assert!(CliArgs::try_parse_from(["mongo-exporter", "mongodb://x"]).is_err());
        assert!(
            CliArgs::try_parse_from(["mongo-exporter", "mongodb://x", "--db", "shop"]).is_err()
        );
    }

    #[test]
    fn test_defaults_come_from_config() {
        let cli = CliInterface::from_args(parse(&[])).unwrap();
        assert_eq!(cli.export_options(), ExportOptions::default());
        assert!(cli.show_progress());
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = CliInterface::from_args(parse(&[
            "--batch-size",
            "500",
            "-j",
            "8",
            "--op-timeout",
            "20",
            "-v",
        ]))
        .unwrap();

        let options = cli.export_options();
        assert_eq!(options.batch_size, 500);
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.operation_timeout, Some(Duration::from_secs(20)));
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let argv = ["mongo-exporter", "uri", "--db", "d", "--out", "o", "--batch-size", "0"];
        assert!(CliArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_quiet_hides_progress_and_logs() {
        let cli = CliInterface::from_args(parse(&["-q"])).unwrap();
        assert!(!cli.show_progress());
        assert_eq!(cli.log_level(), tracing::Level::ERROR);

        let cli = CliInterface::from_args(parse(&["-q", "--vv"])).unwrap();
        assert_eq!(cli.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_job_paths() {
        let cli = CliInterface::from_args(parse(&[])).unwrap();
        let job = cli.job();
        assert_eq!(job.database, "shop");
        assert!(job.run_directory().starts_with("/backups"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&TerminalEvent::NoCollections), 0);
        assert_eq!(exit_code(&TerminalEvent::Aborted), 130);
        assert_eq!(
            exit_code(&TerminalEvent::Error {
                message: "x".into()
            }),
            1
        );
    }
}
