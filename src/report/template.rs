//! HTML and Markdown rendering through Tera

use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera, Value};

use super::error::ReportResult;
use super::types::CaseReport;

const HTML_TEMPLATE: &str = include_str!("templates/report.html");
const MARKDOWN_TEMPLATE: &str = include_str!("templates/report.md");

const ALERT_VERDICTS: &[&str] = &["SYN-flood suspected", "possible TCP flood", "possible UDP flood"];

pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine with the bundled templates
    pub fn new() -> ReportResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("report.html", HTML_TEMPLATE)?;
        tera.add_raw_template("report.md", MARKDOWN_TEMPLATE)?;
        Self::register_filters(&mut tera);
        Ok(Self { tera })
    }

    /// Engine loading `report.html` / `report.md` overrides from a directory.
    /// Bundled templates fill in whatever the directory lacks.
    pub fn with_directory(template_dir: &Path) -> ReportResult<Self> {
        let glob = format!("{}/**/*", template_dir.display());
        let mut tera = Tera::new(&glob)?;
        if !tera.get_template_names().any(|n| n == "report.html") {
            tera.add_raw_template("report.html", HTML_TEMPLATE)?;
        }
        if !tera.get_template_names().any(|n| n == "report.md") {
            tera.add_raw_template("report.md", MARKDOWN_TEMPLATE)?;
        }
        Self::register_filters(&mut tera);
        Ok(Self { tera })
    }

    fn register_filters(tera: &mut Tera) {
        // Wrap a verdict label in a span coloured by severity
        tera.register_filter("verdict_badge", |value: &Value, _: &HashMap<String, Value>| {
            match value.as_str() {
                Some(label) => {
                    let class = if ALERT_VERDICTS.contains(&label) {
                        "verdict-alert"
                    } else {
                        "verdict-ok"
                    };
                    Ok(Value::String(format!(r#"<span class="{}">{}</span>"#, class, label)))
                }
                None => Ok(value.clone()),
            }
        });
    }

    pub fn render_html(&self, report: &CaseReport) -> ReportResult<String> {
        self.render("report.html", report)
    }

    pub fn render_markdown(&self, report: &CaseReport) -> ReportResult<String> {
        self.render("report.md", report)
    }

    fn render(&self, template_name: &str, report: &CaseReport) -> ReportResult<String> {
        let mut context = Context::new();
        context.insert("metadata", &report.metadata);
        context.insert("case", &report.case);
        context.insert("background", &report.background);
        context.insert("evidence", &report.evidence);
        context.insert("analyses", &report.analyses);
        Ok(self.tera.render(template_name, &context)?)
    }
}
