//! Error types for the evidence and analysis pipeline
//!
//! Every failure is scoped to one case, file or analysis attempt. Nothing here
//! is fatal to the process: callers report the error and move on or retry.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::analysis::AnalysisRecord;
use crate::report::ReportError;

/// Result type alias for pipeline operations
pub type ForensicResult<T> = Result<T, ForensicError>;

/// Errors that can occur while acquiring, analyzing or storing evidence
#[derive(Debug)]
pub enum ForensicError {
    /// Missing case or missing evidence file
    NotFound(String),
    /// Wrong file type or malformed input
    Format(String),
    /// Reading or hashing a file failed
    Io { path: PathBuf, source: io::Error },
    /// External capture reader could not be invoked or produced unusable output
    Extraction { metric: String, message: String },
    /// The store rejected a write. `unsaved` holds a record that was computed
    /// but not durably recorded.
    Persist {
        reason: String,
        unsaved: Option<Box<AnalysisRecord>>,
    },
    /// Store read or bootstrap failure
    Store(String),
    /// Case name already registered
    DuplicateCase(String),
    /// Live capture failed, stalled or was killed
    Capture(String),
    /// Configuration could not be loaded or is invalid
    Config(String),
    /// Report rendering failed
    Report(ReportError),
}

impl ForensicError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ForensicError::NotFound(what.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ForensicError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn extraction(metric: impl Into<String>, message: impl Into<String>) -> Self {
        ForensicError::Extraction {
            metric: metric.into(),
            message: message.into(),
        }
    }

    pub fn persist(reason: impl Into<String>) -> Self {
        ForensicError::Persist {
            reason: reason.into(),
            unsaved: None,
        }
    }

    /// Attach a computed record to a persist failure so the caller can still inspect it
    pub fn with_unsaved(self, record: AnalysisRecord) -> Self {
        match self {
            ForensicError::Persist { reason, .. } => ForensicError::Persist {
                reason,
                unsaved: Some(Box::new(record)),
            },
            other => other,
        }
    }

    /// The record that was computed but not written, if any
    pub fn unsaved_record(&self) -> Option<&AnalysisRecord> {
        match self {
            ForensicError::Persist { unsaved, .. } => unsaved.as_deref(),
            _ => None,
        }
    }

    /// Short category name used in audit events and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ForensicError::NotFound(_) => "NotFoundError",
            ForensicError::Format(_) => "FormatError",
            ForensicError::Io { .. } => "IOError",
            ForensicError::Extraction { .. } => "ExtractionError",
            ForensicError::Persist { .. } => "PersistError",
            ForensicError::Store(_) => "StoreError",
            ForensicError::DuplicateCase(_) => "DuplicateCaseError",
            ForensicError::Capture(_) => "CaptureError",
            ForensicError::Config(_) => "ConfigError",
            ForensicError::Report(_) => "ReportError",
        }
    }
}

impl fmt::Display for ForensicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForensicError::NotFound(e) => write!(f, "Not found: {}", e),
            ForensicError::Format(e) => write!(f, "Invalid format: {}", e),
            ForensicError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            ForensicError::Extraction { metric, message } => {
                write!(f, "Extraction of '{}' failed: {}", metric, message)
            }
            ForensicError::Persist { reason, unsaved } => {
                write!(f, "Store rejected write: {}", reason)?;
                if unsaved.is_some() {
                    write!(f, " (analysis computed but NOT recorded)")?;
                }
                Ok(())
            }
            ForensicError::Store(e) => write!(f, "Store error: {}", e),
            ForensicError::DuplicateCase(name) => write!(f, "Case name already exists: {}", name),
            ForensicError::Capture(e) => write!(f, "Capture failed: {}", e),
            ForensicError::Config(e) => write!(f, "Configuration error: {}", e),
            ForensicError::Report(e) => write!(f, "Report error: {}", e),
        }
    }
}

impl std::error::Error for ForensicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForensicError::Io { source, .. } => Some(source),
            ForensicError::Report(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ForensicError {
    fn from(err: rusqlite::Error) -> Self {
        ForensicError::Store(err.to_string())
    }
}

impl From<ReportError> for ForensicError {
    fn from(err: ReportError) -> Self {
        ForensicError::Report(err)
    }
}

impl From<serde_json::Error> for ForensicError {
    fn from(err: serde_json::Error) -> Self {
        ForensicError::Format(err.to_string())
    }
}
