//! Traffic analysis
//!
//! - `record` - case, evidence and analysis record types
//! - `extractor` - concurrent statistics extraction over one capture
//! - `heuristics` - SYN/ACK ratio and proportionality checks
//! - `orchestrator` - the fingerprint / extract / score / persist pipeline

pub mod extractor;
pub mod heuristics;
pub mod orchestrator;
pub mod record;

pub use extractor::{top_talkers, StatisticsExtractor, TrafficStatistics, DEFAULT_TOP_TALKERS};
pub use heuristics::{
    assess_proportionality, assess_syn_ack, proportionality_value, ProportionalityVerdict,
    SynAckAssessment, SynAckVerdict, Thresholds,
};
pub use orchestrator::{AnalysisOptions, AnalysisOrchestrator, AnalysisStage};
pub use record::{AnalysisRecord, Case, EvidenceFile, EvidenceStatus, TopTalker, TrafficCounters};
