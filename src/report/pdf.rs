//! PDF case report using genpdf
//!
//! Layout: cover, background, case details, evidence table, then one page
//! per analysis record with its parameter table and top talkers.

use std::path::Path;
use genpdf::{
    elements::{Break, FrameCellDecorator, PageBreak, Paragraph, TableLayout, Text},
    fonts, style, Alignment, Document, Element, SimplePageDecorator,
};
use tracing::debug;

use super::error::{ReportError, ReportResult};
use super::types::{AnalysisSection, CaseReport};

/// Font families tried in order: directory and family name prefix
const FONT_CANDIDATES: &[(&str, &str)] = &[
    ("./fonts", "LiberationSans"),
    ("/usr/share/fonts/truetype/liberation", "LiberationSans"),
    ("/usr/share/fonts/liberation", "LiberationSans"),
    ("/usr/share/fonts/truetype/dejavu", "DejaVuSans"),
    ("/usr/share/fonts/dejavu", "DejaVuSans"),
    ("/Library/Fonts", "Arial"),
    ("C:\\Windows\\Fonts", "arial"),
];

/// Break long hex strings so genpdf can wrap them
fn grouped(hex: &str, width: usize) -> String {
    hex.as_bytes()
        .chunks(width)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn pdf_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf(e.to_string())
}

#[derive(Debug, Default)]
pub struct PdfGenerator;

impl PdfGenerator {
    pub fn new() -> Self {
        Self
    }

    fn load_fonts(&self) -> ReportResult<fonts::FontFamily<fonts::FontData>> {
        for &(dir, family) in FONT_CANDIDATES {
            if let Ok(font) = fonts::from_files(dir, family, None) {
                debug!(dir, family, "Loaded PDF font family");
                return Ok(font);
            }
        }
        Err(ReportError::Pdf(
            "no TrueType font family found (tried ./fonts, /usr/share/fonts/truetype, \
             /Library/Fonts and C:\\Windows\\Fonts)"
                .to_string(),
        ))
    }

    pub fn generate(&self, report: &CaseReport, output_path: &Path) -> ReportResult<()> {
        let mut doc = Document::new(self.load_fonts()?);
        doc.set_title(format!("{} - {}", report.metadata.title, report.case.case_name));
        doc.set_minimal_conformance();

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(15);
        decorator.set_header(|page| {
            Paragraph::new(if page > 1 { format!("Page {}", page) } else { String::new() })
                .aligned(Alignment::Right)
                .styled(style::Style::new().with_font_size(8))
        });
        doc.set_page_decorator(decorator);

        self.add_cover(&mut doc, report);
        self.add_background(&mut doc, report);
        self.add_case_details(&mut doc, report)?;
        self.add_analyses(&mut doc, report)?;

        doc.render_to_file(output_path).map_err(pdf_err)?;
        Ok(())
    }

    fn add_cover(&self, doc: &mut Document, report: &CaseReport) {
        doc.push(Break::new(12.0));
        doc.push(
            Paragraph::new(report.metadata.title.as_str())
                .aligned(Alignment::Center)
                .styled(style::Style::new().bold().with_font_size(24)),
        );
        doc.push(
            Paragraph::new(report.metadata.subtitle.as_str())
                .aligned(Alignment::Center)
                .styled(style::Style::new().with_font_size(16)),
        );
        doc.push(Break::new(2.0));
        doc.push(
            Paragraph::new(format!("Case {}", report.case.case_name))
                .aligned(Alignment::Center)
                .styled(style::Style::new().with_font_size(12)),
        );
        doc.push(PageBreak::new());
    }

    fn add_background(&self, doc: &mut Document, report: &CaseReport) {
        self.add_section_header(doc, "Summary");
        for section in &report.background {
            doc.push(
                Paragraph::new(section.heading.as_str())
                    .styled(style::Style::new().bold().with_font_size(13)),
            );
            for para in &section.paragraphs {
                doc.push(Paragraph::new(para.as_str()).styled(style::Style::new().with_font_size(10)));
            }
            for bullet in &section.bullets {
                doc.push(
                    Paragraph::new(format!("  - {}", bullet))
                        .styled(style::Style::new().with_font_size(10)),
                );
            }
            doc.push(Break::new(0.75));
        }
        doc.push(PageBreak::new());
    }

    fn add_case_details(&self, doc: &mut Document, report: &CaseReport) -> ReportResult<()> {
        self.add_section_header(doc, "Analysis Result");

        doc.push(Paragraph::new("Case Details").styled(style::Style::new().bold().with_font_size(12)));
        doc.push(Paragraph::new(format!("Case Name: {}", report.case.case_name)));
        doc.push(Paragraph::new(format!("Organization Name: {}", report.case.organization_name)));
        doc.push(Paragraph::new(format!("Investigator Name: {}", report.case.investigator_name)));
        doc.push(Paragraph::new(format!("Date: {}", report.case.date)));
        doc.push(Break::new(1.0));

        doc.push(Paragraph::new("PCAP Files").styled(style::Style::new().bold().with_font_size(12)));
        if report.evidence.is_empty() {
            doc.push(Paragraph::new("No evidence files recorded."));
        } else {
            let mut table = TableLayout::new(vec![3, 1, 1]);
            table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
            table
                .row()
                .element(Text::new("Pcap File").styled(style::Style::new().bold()))
                .element(Text::new("Date").styled(style::Style::new().bold()))
                .element(Text::new("Status").styled(style::Style::new().bold()))
                .push()
                .map_err(pdf_err)?;
            for row in &report.evidence {
                table
                    .row()
                    .element(Text::new(row.filename.as_str()))
                    .element(Text::new(row.date.as_str()))
                    .element(Text::new(row.status.as_str()))
                    .push()
                    .map_err(pdf_err)?;
            }
            doc.push(table);
        }
        doc.push(PageBreak::new());
        Ok(())
    }

    fn add_analyses(&self, doc: &mut Document, report: &CaseReport) -> ReportResult<()> {
        self.add_section_header(doc, "PCAP Analysis Report");
        if report.analyses.is_empty() {
            doc.push(Paragraph::new("No analysis data found."));
            return Ok(());
        }

        for (i, section) in report.analyses.iter().enumerate() {
            if i > 0 {
                doc.push(PageBreak::new());
            }
            self.add_analysis(doc, section)?;
        }
        Ok(())
    }

    fn add_analysis(&self, doc: &mut Document, section: &AnalysisSection) -> ReportResult<()> {
        let r = &section.record;
        doc.push(
            Paragraph::new(format!("PCAP File: {}", r.evidence_filename))
                .styled(style::Style::new().bold().with_font_size(12)),
        );
        doc.push(Break::new(0.5));

        let params: Vec<(&str, String)> = vec![
            ("Total Packets", r.total_packets.to_string()),
            ("TCP Count", r.counters.tcp.to_string()),
            ("UDP Count", r.counters.udp.to_string()),
            ("HTTP Count", r.counters.http.to_string()),
            ("SYN Count", r.counters.syn.to_string()),
            ("SYN-ACK Count", r.counters.syn_ack.to_string()),
            ("ACK Count", r.counters.ack.to_string()),
            ("SYN without ACK Count", r.counters.syn_without_ack.to_string()),
            ("SYN-ACK Ratio", section.ratio_display.clone()),
            ("SYN-ACK Ratio Result", r.syn_ack.verdict.as_str().to_string()),
            ("Proportionality Result", r.proportionality.as_str().to_string()),
            (
                "File Hash",
                format!("{} {}", r.fingerprint_algorithm, grouped(&r.fingerprint, 16)),
            ),
            ("Analysis Date", r.analysis_timestamp.clone()),
        ];

        let mut table = TableLayout::new(vec![2, 3]);
        table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        for (label, value) in params {
            table
                .row()
                .element(Text::new(label).styled(style::Style::new().bold()))
                .element(Paragraph::new(value))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(table);

        doc.push(Break::new(0.5));
        doc.push(Paragraph::new(section.syn_ack_detail.as_str()).styled(style::Style::new().italic()));
        doc.push(Break::new(0.75));

        doc.push(Paragraph::new("Top Talkers").styled(style::Style::new().bold().with_font_size(11)));
        let mut talkers = TableLayout::new(vec![2, 1]);
        talkers.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        talkers
            .row()
            .element(Text::new("IP").styled(style::Style::new().bold()))
            .element(Text::new("Count").styled(style::Style::new().bold()))
            .push()
            .map_err(pdf_err)?;
        for t in &r.top_talkers {
            talkers
                .row()
                .element(Text::new(t.address.as_str()))
                .element(Text::new(t.count.to_string()))
                .push()
                .map_err(pdf_err)?;
        }
        doc.push(talkers);
        Ok(())
    }

    fn add_section_header(&self, doc: &mut Document, title: &str) {
        doc.push(
            Paragraph::new(title)
                .aligned(Alignment::Center)
                .styled(style::Style::new().bold().with_font_size(18)),
        );
        doc.push(Break::new(1.0));
    }
}
