//! Error handling for the exporter.
//!
//! This module provides:
//! - A crate-wide [`ExporterError`] type and [`Result`] alias
//! - Export-engine specific error kinds ([`ExportError`])
//! - Structured information extracted from MongoDB driver errors
//!
//! # Example
//!
//! ```rust,no_run
//! use mongo_exporter::error::{ExportError, ExporterError, Result};
//!
//! fn check(cancelled: bool) -> Result<()> {
//!     if cancelled {
//!         return Err(ExportError::Cancelled.into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod kinds;
pub mod mongo;

// Re-export commonly used types
pub use kinds::{ConfigError, ConnectionError, ExportError, ExporterError, Result};
pub use mongo::ErrorInfo;
