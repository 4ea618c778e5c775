//! Case, evidence and analysis record types
//!
//! Ownership runs Case -> EvidenceFile* -> AnalysisRecord*. All three are
//! written once and never updated.

use serde::{Deserialize, Serialize};

use super::heuristics::{ProportionalityVerdict, SynAckAssessment};

/// An investigation, keyed by its unique case name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: i64,
    pub case_name: String,
    pub organization_name: String,
    pub investigator_name: String,
    /// Registration date, `YYYY-MM-DD`
    pub date: String,
}

/// How an evidence file entered storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStatus {
    /// Produced by a live capture
    Collected,
    /// Copied in from an external capture file
    Imported,
}

impl EvidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStatus::Collected => "collected",
            EvidenceStatus::Imported => "imported",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "collected" => Some(EvidenceStatus::Collected),
            "imported" => Some(EvidenceStatus::Imported),
            _ => None,
        }
    }
}

/// One capture file belonging to a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub id: i64,
    pub case_name: String,
    pub file_path: String,
    pub date: String,
    pub status: EvidenceStatus,
}

impl EvidenceFile {
    /// Bare filename of the stored capture
    pub fn filename(&self) -> String {
        std::path::Path::new(&self.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.clone())
    }
}

/// A source address and how often it occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTalker {
    pub address: String,
    pub count: u64,
}

/// Per-protocol/flag packet counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficCounters {
    pub tcp: u64,
    pub udp: u64,
    pub http: u64,
    pub syn: u64,
    pub syn_ack: u64,
    pub ack: u64,
    pub syn_without_ack: u64,
}

/// One completed analysis pass over one evidence file.
///
/// A point-in-time snapshot: re-running analysis creates a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Store row id; `None` until the record has been written
    pub id: Option<i64>,
    pub case_name: String,
    pub organization_name: String,
    pub evidence_filename: String,
    pub total_packets: u64,
    pub top_talkers: Vec<TopTalker>,
    pub counters: TrafficCounters,
    pub syn_ack: SynAckAssessment,
    pub proportionality: ProportionalityVerdict,
    pub fingerprint_algorithm: String,
    pub fingerprint: String,
    /// `YYYY-MM-DD HH:MM:SS`, local time
    pub analysis_timestamp: String,
}

impl AnalysisRecord {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Serialize the top talkers for the store (JSON array of objects)
    pub fn top_talkers_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.top_talkers)
    }

    /// Decode a stored top-talker list
    pub fn parse_top_talkers(encoded: &str) -> serde_json::Result<Vec<TopTalker>> {
        serde_json::from_str(encoded)
    }
}

#[cfg(test)]
impl AnalysisRecord {
    pub(crate) fn sample() -> Self {
        use super::heuristics::{assess_proportionality, assess_syn_ack, Thresholds};

        let counters = TrafficCounters {
            tcp: 150,
            udp: 50,
            http: 40,
            syn: 100,
            syn_ack: 5,
            ack: 60,
            syn_without_ack: 95,
        };
        let thresholds = Thresholds::default();
        AnalysisRecord {
            id: None,
            case_name: "Acme-Case1".to_string(),
            organization_name: "Acme".to_string(),
            evidence_filename: "Acme-Acme-Case1-1.pcap".to_string(),
            total_packets: 200,
            top_talkers: vec![
                TopTalker { address: "10.0.0.1.443".to_string(), count: 120 },
                TopTalker { address: "10.0.0.2.80".to_string(), count: 80 },
            ],
            syn_ack: assess_syn_ack(counters.syn, counters.syn_ack, &thresholds),
            proportionality: assess_proportionality(&counters, &thresholds),
            counters,
            fingerprint_algorithm: "SHA-256".to_string(),
            fingerprint: "00".repeat(32),
            analysis_timestamp: "2026-10-15 12:00:00".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_talkers_json_is_structured() {
        let record = AnalysisRecord::sample();
        let encoded = record.top_talkers_json().unwrap();
        assert_eq!(
            encoded,
            r#"[{"address":"10.0.0.1.443","count":120},{"address":"10.0.0.2.80","count":80}]"#
        );
        assert_eq!(AnalysisRecord::parse_top_talkers(&encoded).unwrap(), record.top_talkers);
    }

    #[test]
    fn test_python_style_list_is_rejected() {
        assert!(AnalysisRecord::parse_top_talkers("[('10.0.0.1', 5)]").is_err());
    }

    #[test]
    fn test_evidence_filename() {
        let ev = EvidenceFile {
            id: 1,
            case_name: "C".into(),
            file_path: "/data/outputs/Acme-C-1.pcap".into(),
            date: "2026-10-15".into(),
            status: EvidenceStatus::Imported,
        };
        assert_eq!(ev.filename(), "Acme-C-1.pcap");
        assert_eq!(EvidenceStatus::parse("imported"), Some(EvidenceStatus::Imported));
        assert_eq!(EvidenceStatus::parse("other"), None);
    }
}
