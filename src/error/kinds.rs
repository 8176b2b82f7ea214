use std::{fmt, io};

use crate::error::mongo::format_mongodb_error;

/// Crate-wide `Result` type using [`ExporterError`] as the error.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Top-level error type for exporter operations.
///
/// Wraps the more specific error kinds so a single type can flow through
/// the engine, the CLI and the library API.
#[derive(Debug)]
pub enum ExporterError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Configuration errors.
    Config(ConfigError),

    /// Export engine errors.
    Export(ExportError),

    /// I/O errors (run directory, output files, archive file).
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// Zip archive errors.
    Archive(zip::result::ZipError),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Ping command failed.
    PingFailed(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    ReadFailed { path: String, reason: String },

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Errors raised by the export engine itself.
#[derive(Debug)]
pub enum ExportError {
    /// The shared cancellation token fired.
    Cancelled,

    /// A database call exceeded the per-operation deadline.
    Timeout { operation: String, seconds: u64 },

    /// Progress was reported for a collection that was never registered.
    UnknownCollection(String),

    /// A collection total was registered twice.
    DuplicateRegistration(String),

    /// Writing an output file failed.
    WriteFailed { path: String, reason: String },

    /// A document could not be converted to extended JSON.
    Serialization(String),

    /// A worker task panicked or was aborted.
    TaskFailed(String),
}

impl ExporterError {
    /// Whether this error represents a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExporterError::Export(ExportError::Cancelled))
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExporterError::Connection(e) => write!(f, "Connection error: {e}"),
            ExporterError::Config(e) => write!(f, "Configuration error: {e}"),
            ExporterError::Export(e) => write!(f, "Export error: {e}"),
            ExporterError::Io(e) => write!(f, "I/O error: {e}"),
            ExporterError::MongoDb(e) => format_mongodb_error(f, e),
            ExporterError::Archive(e) => write!(f, "Archive error: {e}"),
            ExporterError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed { path, reason } => {
                write!(f, "Cannot read config file {path}: {reason}")
            }
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Cancelled => write!(f, "Export aborted by user"),
            ExportError::Timeout { operation, seconds } => {
                write!(f, "{operation} did not complete within {seconds}s")
            }
            ExportError::UnknownCollection(name) => {
                write!(f, "Collection '{name}' has no registered total")
            }
            ExportError::DuplicateRegistration(name) => {
                write!(f, "Collection '{name}' is already registered")
            }
            ExportError::WriteFailed { path, reason } => {
                write!(f, "Failed to write {path}: {reason}")
            }
            ExportError::Serialization(msg) => write!(f, "Serialization failed: {msg}"),
            ExportError::TaskFailed(msg) => write!(f, "Worker task failed: {msg}"),
        }
    }
}

impl std::error::Error for ExporterError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ExportError {}

/* ========================= Conversions to ExporterError ========================= */

impl From<io::Error> for ExporterError {
    fn from(err: io::Error) -> Self {
        ExporterError::Io(err)
    }
}

impl From<mongodb::error::Error> for ExporterError {
    fn from(err: mongodb::error::Error) -> Self {
        ExporterError::MongoDb(err)
    }
}

impl From<zip::result::ZipError> for ExporterError {
    fn from(err: zip::result::ZipError) -> Self {
        ExporterError::Archive(err)
    }
}

impl From<walkdir::Error> for ExporterError {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io) => ExporterError::Io(io),
            None => ExporterError::Generic("Filesystem loop detected while walking".to_string()),
        }
    }
}

impl From<ConnectionError> for ExporterError {
    fn from(err: ConnectionError) -> Self {
        ExporterError::Connection(err)
    }
}

impl From<ConfigError> for ExporterError {
    fn from(err: ConfigError) -> Self {
        ExporterError::Config(err)
    }
}

impl From<ExportError> for ExporterError {
    fn from(err: ExportError) -> Self {
        ExporterError::Export(err)
    }
}

impl From<String> for ExporterError {
    fn from(msg: String) -> Self {
        ExporterError::Generic(msg)
    }
}

impl From<&str> for ExporterError {
    fn from(msg: &str) -> Self {
        ExporterError::Generic(msg.to_owned())
    }
}
