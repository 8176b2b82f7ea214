use std::fmt;

/// Structured error information extracted from MongoDB errors.
///
/// Terminal error events and log lines carry this instead of the driver's
/// verbose debug representation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub(crate) code: Option<i32>,
    pub(crate) name: Option<String>,
    pub(crate) message: Option<String>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MongoDB error")?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some(code) = self.code {
            write!(f, " ({code})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Format a MongoDB driver error as a single readable line.
///
/// Used by the parent module's `Display` implementation for
/// `ExporterError::MongoDb`.
pub fn format_mongodb_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    write!(f, "{}", extract_error_info(error))
}

/// Extract structured information from a MongoDB error using the driver API.
///
/// Only the kinds an export can hit on its read path are mapped; everything
/// else falls back to the driver's `Display`.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::ErrorKind;

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => {
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = get_error_name(command_error.code).or_else(|| {
                (!command_error.code_name.is_empty()).then(|| command_error.code_name.clone())
            });
        }
        ErrorKind::Authentication { message, .. } => {
            info.name = Some("AuthenticationFailed".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.name = Some("ServerSelectionFailed".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.message = Some(message.clone());
        }
        ErrorKind::Io(io_error) => {
            info.message = Some(io_error.to_string());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    info
}

/// Get a human-readable error name from the MongoDB error codes an export
/// commonly runs into.
fn get_error_name(code: i32) -> Option<String> {
    let name = match code {
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        43 => "CursorNotFound",
        50 => "MaxTimeMSExpired",
        237 => "CursorKilled",
        _ => return None,
    };

    Some(name.to_string())
}
