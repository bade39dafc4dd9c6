use std::fmt;

/// Custom error types for the export pipeline
///
/// Only fatal conditions become an `ExportError`; row-local problems (missing
/// image, unreadable metadata, sequence gap) are counted and logged at the row
/// boundary instead of propagating.
#[derive(Debug)]
pub enum ExportError {
    /// I/O errors on the output CSV, sidecar log, or image files
    Io(std::io::Error),
    /// Telemetry stream read fault unrelated to normal end-of-stream
    Stream(String),
    /// Malformed export configuration (e.g. image name pattern)
    Config(String),
    /// Image metadata read or rewrite failure
    Image(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io(err) => write!(f, "I/O error: {}", err),
            ExportError::Stream(msg) => write!(f, "Stream error: {}", msg),
            ExportError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ExportError::Image(msg) => write!(f, "Image error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err)
    }
}
