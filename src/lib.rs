//! MongoDB database exporter
//!
//! This library exports every collection of a MongoDB database into its own
//! newline-delimited extended-JSON file and packages the run into a zip
//! archive, with aggregated progress and cooperative cancellation.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and progress rendering
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `error`: Error types and handling
//! - `export`: Export engine (coordinator, writers, archive)
//! - `source`: Document source abstraction over the driver
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mongo_exporter::{config::Config, connection::ConnectionManager};
//! use mongo_exporter::export::{ExportCoordinator, ExportJob, ExportOptions};
//! use mongo_exporter::source::MongoSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut manager = ConnectionManager::new(
//!         "mongodb://localhost:27017".to_string(),
//!         config.connection,
//!     );
//!     manager.connect().await?;
//!
//!     let source = Arc::new(MongoSource::new(manager.database("shop")?));
//!     let job = ExportJob::new("mongodb://localhost:27017", "shop", "/backups");
//!     let outcome = ExportCoordinator::new(source, ExportOptions::default()).run(&job).await;
//!     println!("{outcome}");
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod export;
pub mod source;

// Re-export commonly used types
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{ExporterError, Result};
pub use export::{ExportCoordinator, ExportJob, ExportOptions, TerminalEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
