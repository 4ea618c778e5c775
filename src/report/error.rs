//! Report rendering errors

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug)]
pub enum ReportError {
    /// Writing the output file failed
    Io { path: PathBuf, source: io::Error },
    /// Tera failed to parse or render a template
    Template(tera::Error),
    /// genpdf failed (fonts, layout or rendering)
    Pdf(String),
    Serialization(serde_json::Error),
    /// Format name not recognised
    UnsupportedFormat(String),
}

impl ReportError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        ReportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io { path, source } => write!(f, "cannot write {}: {}", path.display(), source),
            ReportError::Template(e) => write!(f, "template rendering failed: {}", e),
            ReportError::Pdf(e) => write!(f, "PDF generation failed: {}", e),
            ReportError::Serialization(e) => write!(f, "report serialization failed: {}", e),
            ReportError::UnsupportedFormat(name) => {
                write!(f, "unsupported report format '{}' (expected pdf, html, md or json)", name)
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io { source, .. } => Some(source),
            ReportError::Template(e) => Some(e),
            ReportError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tera::Error> for ReportError {
    fn from(err: tera::Error) -> Self {
        ReportError::Template(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}
