//! Report data model
//!
//! A `CaseReport` is a read-only view over what the store holds for one case.
//! Every output format renders from this one structure.

use serde::Serialize;

use crate::analysis::{AnalysisRecord, EvidenceFile};
use crate::case::CaseOverview;

pub const REPORT_TITLE: &str = "NETWORK FORENSIC TOOL";
pub const REPORT_SUBTITLE: &str = "Report For Web Traffic Analysis";

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub title: String,
    pub subtitle: String,
    /// `YYYY-MM-DD HH:MM:SS UTC`
    pub generated_at: String,
    pub generated_by: String,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            subtitle: REPORT_SUBTITLE.to_string(),
            generated_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            generated_by: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

/// One explanatory section (heading, paragraphs, optional bullet list)
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundSection {
    pub heading: String,
    pub paragraphs: Vec<String>,
    pub bullets: Vec<String>,
}

impl BackgroundSection {
    fn new(heading: &str, paragraphs: &[&str]) -> Self {
        Self {
            heading: heading.to_string(),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
            bullets: Vec::new(),
        }
    }

    fn with_bullets(mut self, bullets: &[&str]) -> Self {
        self.bullets = bullets.iter().map(|b| b.to_string()).collect();
        self
    }
}

/// DoS/DDoS background printed ahead of the case findings
pub fn background_sections() -> Vec<BackgroundSection> {
    vec![
        BackgroundSection::new(
            "DoS/DDoS Attack",
            &[
                "A denial-of-service (DoS) attack floods a server with traffic until a website or resource becomes unavailable.",
                "A distributed denial-of-service (DDoS) attack does the same from many sources at once. Compromised computers and other networked devices, IoT equipment included, are used to overwhelm the target or the infrastructure around it.",
            ],
        ),
        BackgroundSection::new(
            "Identifying a DDoS attack",
            &[
                "The most visible symptom is a service that suddenly becomes slow or unavailable. Legitimate traffic spikes cause the same symptom, so traffic analysis is needed to tell them apart. Typical signs include:",
            ],
        )
        .with_bullets(&[
            "Suspicious amounts of traffic from a single IP address or range",
            "A flood of traffic from clients sharing one behavioral profile (device type, geolocation, browser version)",
            "An unexplained surge of requests to a single page or endpoint",
            "Odd traffic patterns such as spikes at unusual hours or at fixed intervals",
        ]),
        BackgroundSection::new(
            "Flooding attack",
            &[
                "The attacker sends many connection requests and never completes the handshake. Pending half-open connections pile up until real clients cannot connect. A high SYN to SYN-ACK ratio is the classic signature.",
            ],
        ),
        BackgroundSection::new(
            "Protocol attack",
            &[
                "Exploits weaknesses in layers 3 and 4, for example by abusing the TCP connection sequence or answering with spoofed source addresses, until network resources are exhausted.",
            ],
        ),
        BackgroundSection::new(
            "Application-based attack",
            &[
                "Targets layer 7. Slowloris, for instance, keeps many partial HTTP requests open and uses almost no bandwidth, which makes it hard to detect.",
            ],
        ),
        BackgroundSection::new(
            "Method",
            &[
                "Each capture is fingerprinted when it is analyzed. Packet totals, per-protocol and per-flag counts and the most frequent source addresses are extracted, then two heuristics are applied: the SYN/SYN-ACK ratio check and the protocol proportionality check. The thresholds are heuristic indicators, not proof of an attack.",
            ],
        ),
    ]
}

/// Evidence table row
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRow {
    pub filename: String,
    pub date: String,
    pub status: String,
}

impl From<&EvidenceFile> for EvidenceRow {
    fn from(ev: &EvidenceFile) -> Self {
        Self {
            filename: ev.filename(),
            date: ev.date.clone(),
            status: ev.status.as_str().to_string(),
        }
    }
}

/// One analysis record plus the display strings derived from it
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSection {
    pub record: AnalysisRecord,
    pub ratio_display: String,
    pub syn_ack_detail: String,
    pub flagged: bool,
}

impl From<AnalysisRecord> for AnalysisSection {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            ratio_display: record.syn_ack.ratio_display(),
            syn_ack_detail: record.syn_ack.detail().to_string(),
            flagged: record.syn_ack.verdict.is_alert() || record.proportionality.is_alert(),
            record,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseDetails {
    pub case_name: String,
    pub organization_name: String,
    pub investigator_name: String,
    pub date: String,
}

/// Complete report for one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub metadata: ReportMetadata,
    pub case: CaseDetails,
    pub background: Vec<BackgroundSection>,
    pub evidence: Vec<EvidenceRow>,
    pub analyses: Vec<AnalysisSection>,
}

impl CaseReport {
    pub fn flagged_count(&self) -> usize {
        self.analyses.iter().filter(|a| a.flagged).count()
    }
}

impl From<CaseOverview> for CaseReport {
    fn from(overview: CaseOverview) -> Self {
        let CaseOverview { case, evidence, analyses } = overview;
        Self {
            metadata: ReportMetadata::default(),
            case: CaseDetails {
                case_name: case.case_name,
                organization_name: case.organization_name,
                investigator_name: case.investigator_name,
                date: case.date,
            },
            background: background_sections(),
            evidence: evidence.iter().map(EvidenceRow::from).collect(),
            analyses: analyses.into_iter().map(AnalysisSection::from).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_report() -> CaseReport {
    use crate::analysis::{Case, EvidenceStatus};

    CaseReport::from(CaseOverview {
        case: Case {
            id: 1,
            case_name: "Acme-Case1".into(),
            organization_name: "Acme".into(),
            investigator_name: "J. Doe".into(),
            date: "2026-10-15".into(),
        },
        evidence: vec![EvidenceFile {
            id: 1,
            case_name: "Acme-Case1".into(),
            file_path: "/ev/Acme-Acme-Case1-1.pcap".into(),
            date: "2026-10-15".into(),
            status: EvidenceStatus::Collected,
        }],
        analyses: vec![AnalysisRecord::sample()],
    })
}
