//! Case report generation
//!
//! Builds a `CaseReport` from the store and renders it as:
//! - PDF (genpdf)
//! - HTML and Markdown (Tera templates bundled with the crate)
//! - JSON (serde_json)
//!
//! Top talkers reach every renderer as typed `(address, count)` pairs; no
//! stored text is ever evaluated.

pub mod error;
pub mod pdf;
pub mod template;
pub mod types;

pub use error::{ReportError, ReportResult};
pub use pdf::PdfGenerator;
pub use template::TemplateEngine;
pub use types::{AnalysisSection, BackgroundSection, CaseReport, EvidenceRow, ReportMetadata};

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::case;
use crate::common::{audit, sanitize_component};
use crate::database::EvidenceStore;
use crate::error::{ForensicError, ForensicResult};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Html,
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }

    pub fn parse(name: &str) -> ReportResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "html" | "htm" => Ok(OutputFormat::Html),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(ReportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// `<report_dir>/<case>_report.<ext>`
pub fn default_output_path(report_dir: &Path, case_name: &str, format: OutputFormat) -> PathBuf {
    report_dir.join(format!("{}_report.{}", sanitize_component(case_name), format.extension()))
}

/// Dispatches a report to the renderer for its format
pub struct ReportGenerator {
    template_engine: TemplateEngine,
    pdf_generator: PdfGenerator,
}

impl ReportGenerator {
    pub fn new() -> ReportResult<Self> {
        Ok(Self {
            template_engine: TemplateEngine::new()?,
            pdf_generator: PdfGenerator::new(),
        })
    }

    /// Use templates from `template_dir` where present
    pub fn with_templates(template_dir: &Path) -> ReportResult<Self> {
        Ok(Self {
            template_engine: TemplateEngine::with_directory(template_dir)?,
            pdf_generator: PdfGenerator::new(),
        })
    }

    pub fn generate(&self, report: &CaseReport, format: OutputFormat, output_path: &Path) -> ReportResult<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
            }
        }

        let text = match format {
            OutputFormat::Pdf => return self.pdf_generator.generate(report, output_path),
            OutputFormat::Html => self.template_engine.render_html(report)?,
            OutputFormat::Markdown => self.template_engine.render_markdown(report)?,
            OutputFormat::Json => serde_json::to_string_pretty(report)?,
        };
        std::fs::write(output_path, text).map_err(|e| ReportError::io(output_path, e))
    }
}

/// Build and write the report for one case. Returns the path written.
#[instrument(skip(store, generator, report_dir, output))]
pub fn write_case_report(
    store: &dyn EvidenceStore,
    generator: &ReportGenerator,
    case_name: &str,
    format: OutputFormat,
    report_dir: &Path,
    output: Option<&Path>,
) -> ForensicResult<PathBuf> {
    let overview = case::case_overview(store, case_name)?;
    let report = CaseReport::from(overview);

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(report_dir, &report.case.case_name, format),
    };

    generator
        .generate(&report, format, &path)
        .map_err(ForensicError::from)?;

    audit::log_report_generation(&report.case.case_name, format.extension(), &path);
    info!(
        path = %path.display(),
        analyses = report.analyses.len(),
        flagged = report.flagged_count(),
        "Report generated"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisRecord;
    use crate::database::Database;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::parse("PDF").unwrap(), OutputFormat::Pdf);
        assert_eq!(OutputFormat::parse("markdown").unwrap(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert!(matches!(
            OutputFormat::parse("docx"),
            Err(ReportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/reports"), "Acme-Case1", OutputFormat::Html);
        assert_eq!(path, PathBuf::from("/reports/Acme-Case1_report.html"));
    }

    #[test]
    fn test_write_case_report_json() {
        let db = Database::open_in_memory().unwrap();
        case::register_case(&db, "Acme-Case1", "Acme", "J. Doe").unwrap();
        db.insert_analysis(&AnalysisRecord::sample()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new().unwrap();
        let path = write_case_report(&db, &generator, "Acme-Case1", OutputFormat::Json, dir.path(), None)
            .unwrap();

        assert_eq!(path, dir.path().join("Acme-Case1_report.json"));
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let talkers = &value["analyses"][0]["record"]["top_talkers"];
        assert_eq!(talkers[0]["address"], "10.0.0.1.443");
        assert_eq!(talkers[0]["count"], 120);
    }

    #[test]
    fn test_report_for_unknown_case() {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new().unwrap();
        let err = write_case_report(&db, &generator, "Nope", OutputFormat::Markdown, dir.path(), None)
            .unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }
}
