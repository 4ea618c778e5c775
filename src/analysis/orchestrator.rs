//! Analysis pipeline for one evidence file
//!
//! Start -> Fingerprint -> Extract -> Score -> Persist -> Done, terminal on
//! the first failure. Nothing is written to the store unless every earlier
//! stage succeeded, and the store write itself is one row or none.

use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

use crate::capture::CaptureReader;
use crate::case;
use crate::common::{audit, fingerprint_file, resolve_evidence_file, HashAlgorithm, DEFAULT_CHUNK_SIZE};
use crate::database::EvidenceStore;
use crate::error::{ForensicError, ForensicResult};

use super::extractor::{StatisticsExtractor, DEFAULT_TOP_TALKERS};
use super::heuristics::{assess_proportionality, assess_syn_ack, Thresholds};
use super::record::{AnalysisRecord, Case};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Start,
    Fingerprint,
    Extract,
    Score,
    Persist,
    Done,
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Start => "start",
            AnalysisStage::Fingerprint => "fingerprint",
            AnalysisStage::Extract => "extract",
            AnalysisStage::Score => "score",
            AnalysisStage::Persist => "persist",
            AnalysisStage::Done => "done",
            AnalysisStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tunables for one analysis pass
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub algorithm: HashAlgorithm,
    pub chunk_size: usize,
    pub thresholds: Thresholds,
    pub threads: usize,
    pub top_limit: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            thresholds: Thresholds::default(),
            threads: num_cpus::get(),
            top_limit: DEFAULT_TOP_TALKERS,
        }
    }
}

/// Drives fingerprinting, extraction and scoring, then hands the record to
/// the store. Constructed once per session.
pub struct AnalysisOrchestrator<'a> {
    store: &'a dyn EvidenceStore,
    extractor: StatisticsExtractor<'a>,
    evidence_dir: PathBuf,
    options: AnalysisOptions,
}

impl<'a> AnalysisOrchestrator<'a> {
    pub fn new(
        store: &'a dyn EvidenceStore,
        reader: &'a dyn CaptureReader,
        evidence_dir: impl Into<PathBuf>,
        options: AnalysisOptions,
    ) -> ForensicResult<Self> {
        let extractor = StatisticsExtractor::new(reader, options.threads, options.top_limit)?;
        Ok(Self {
            store,
            extractor,
            evidence_dir: evidence_dir.into(),
            options,
        })
    }

    /// Run the full pipeline for `filename` in the evidence directory.
    ///
    /// Returns the persisted record (with its store id). A store rejection is
    /// returned as `PersistError` carrying the computed record.
    #[instrument(skip(self, case), fields(case = %case.case_name))]
    pub fn analyze(&self, case: &Case, filename: &str) -> ForensicResult<AnalysisRecord> {
        let mut stage = AnalysisStage::Start;
        let result = self.run(case, filename, &mut stage);

        match &result {
            Ok(record) => {
                debug!(stage = %AnalysisStage::Done, id = ?record.id, "Analysis complete");
                audit::log_analysis_outcome(
                    &case.case_name,
                    filename,
                    true,
                    &format!(
                        "{}; {}",
                        record.syn_ack.verdict.as_str(),
                        record.proportionality.as_str()
                    ),
                );
            }
            Err(e) => {
                warn!(stage = %AnalysisStage::Failed, failed_at = %stage, error = %e, "Analysis aborted");
                audit::log_analysis_outcome(&case.case_name, filename, false, &format!("{}: {}", e.kind(), e));
            }
        }
        result
    }

    fn run(&self, case: &Case, filename: &str, stage: &mut AnalysisStage) -> ForensicResult<AnalysisRecord> {
        let path = resolve_evidence_file(&self.evidence_dir, filename)?;
        case::owned_evidence(self.store, case, filename)?;

        *stage = AnalysisStage::Fingerprint;
        debug!(stage = %stage, path = %path.display());
        let fingerprint = fingerprint_file(&path, self.options.algorithm, self.options.chunk_size)?;
        audit::log_fingerprint(&path, self.options.algorithm.name(), &fingerprint, None, None);

        *stage = AnalysisStage::Extract;
        debug!(stage = %stage);
        let stats = self.extractor.extract(&path)?;

        *stage = AnalysisStage::Score;
        debug!(stage = %stage);
        let thresholds = &self.options.thresholds;
        let syn_ack = assess_syn_ack(stats.counters.syn, stats.counters.syn_ack, thresholds);
        let proportionality = assess_proportionality(&stats.counters, thresholds);

        let mut record = AnalysisRecord {
            id: None,
            case_name: case.case_name.clone(),
            organization_name: case.organization_name.clone(),
            evidence_filename: filename.trim().to_string(),
            total_packets: stats.total_packets,
            top_talkers: stats.top_talkers,
            counters: stats.counters,
            syn_ack,
            proportionality,
            fingerprint_algorithm: self.options.algorithm.name().to_string(),
            fingerprint,
            analysis_timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        *stage = AnalysisStage::Persist;
        debug!(stage = %stage);
        match self.store.insert_analysis(&record) {
            Ok(id) => {
                record.id = Some(id);
                info!(id, file = filename, "Analysis recorded");
                Ok(record)
            }
            Err(e @ ForensicError::Persist { .. }) => Err(e.with_unsaved(record)),
            Err(other) => Err(ForensicError::persist(other.to_string()).with_unsaved(record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extractor::testing::ScriptedReader;
    use crate::analysis::{EvidenceFile, EvidenceStatus, ProportionalityVerdict, SynAckVerdict};
    use crate::capture::{CaptureAcquirer, TrafficFilter};
    use crate::common::compute_hash;
    use crate::database::Database;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    const CAPTURE_BYTES: &[u8] = b"\xd4\xc3\xb2\xa1 fixed capture bytes";

    fn acme_reader() -> ScriptedReader {
        ScriptedReader::new(
            &[
                (TrafficFilter::All, 200),
                (TrafficFilter::Tcp, 150),
                (TrafficFilter::Udp, 50),
                (TrafficFilter::Http, 40),
                (TrafficFilter::Syn, 100),
                (TrafficFilter::SynAck, 5),
                (TrafficFilter::Ack, 60),
                (TrafficFilter::SynWithoutAck, 95),
            ],
            &["10.0.0.7.4444", "10.0.0.7.4444", "10.0.0.8.53"],
        )
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions { threads: 2, ..AnalysisOptions::default() }
    }

    struct Fixture {
        db: Database,
        case: Case,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let case = case::register_case(&db, "Case1", "Acme", "J. Doe").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Acme-Case1-1.pcap");
        std::fs::write(&path, CAPTURE_BYTES).unwrap();
        db.insert_evidence("Case1", &path, EvidenceStatus::Collected).unwrap();
        Fixture { db, case, dir }
    }

    #[test]
    fn test_end_to_end_record() {
        let fx = fixture();
        let reader = acme_reader();
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), options()).unwrap();

        let record = orch.analyze(&fx.case, "Acme-Case1-1.pcap").unwrap();

        assert!(record.is_persisted());
        assert_eq!(record.total_packets, 200);
        assert!((record.syn_ack.ratio - 20.0).abs() < f64::EPSILON);
        assert_eq!(record.syn_ack.ratio_display(), "20.0000");
        assert_eq!(record.syn_ack.verdict, SynAckVerdict::FloodSuspected);
        assert_eq!(record.proportionality, ProportionalityVerdict::Proportional);
        assert_eq!(record.fingerprint, compute_hash(CAPTURE_BYTES, HashAlgorithm::Sha256));
        assert_eq!(record.top_talkers[0].address, "10.0.0.7.4444");
        assert_eq!(record.top_talkers[0].count, 2);

        let stored = fx.db.analyses_for_file("Case1", "Acme-Case1-1.pcap").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], record);
    }

    #[test]
    fn test_extraction_failure_writes_nothing() {
        let fx = fixture();
        let reader = acme_reader().failing(TrafficFilter::SynAck);
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), options()).unwrap();

        let err = orch.analyze(&fx.case, "Acme-Case1-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
        assert!(fx.db.analyses_for_case("Case1").unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_never_reaches_extraction() {
        let fx = fixture();
        let reader = acme_reader();
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), options()).unwrap();

        let err = orch.analyze(&fx.case, "Acme-Case1-9.pcap").unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
        assert!(fx.db.analyses_for_case("Case1").unwrap().is_empty());
    }

    #[test]
    fn test_other_cases_evidence_is_rejected() {
        let fx = fixture();
        let other = case::register_case(&fx.db, "CaseB", "Beta", "R. Roe").unwrap();
        let foreign = fx.dir.path().join("Beta-CaseB-1.pcap");
        std::fs::write(&foreign, CAPTURE_BYTES).unwrap();
        fx.db.insert_evidence("CaseB", &foreign, EvidenceStatus::Collected).unwrap();

        let reader = acme_reader();
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), options()).unwrap();

        let err = orch.analyze(&fx.case, "Beta-CaseB-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
        assert!(fx.db.analyses_for_case("Case1").unwrap().is_empty());

        orch.analyze(&other, "Beta-CaseB-1.pcap").unwrap();
        assert_eq!(fx.db.analyses_for_case("CaseB").unwrap().len(), 1);
    }

    #[test]
    fn test_unregistered_file_in_evidence_dir_is_rejected() {
        let fx = fixture();
        std::fs::write(fx.dir.path().join("Acme-Case1-2.pcap"), CAPTURE_BYTES).unwrap();
        let reader = acme_reader();
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), options()).unwrap();

        let err = orch.analyze(&fx.case, "Acme-Case1-2.pcap").unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
        assert!(fx.db.analyses_for_case("Case1").unwrap().is_empty());
    }

    #[test]
    fn test_register_import_analyze() {
        let db = Database::open_in_memory().unwrap();
        let acme = case::register_case(&db, "Acme-Case1", "Acme", "J. Doe").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let evidence_dir = dir.path().join("outputs");
        std::fs::create_dir_all(&evidence_dir).unwrap();
        let source = dir.path().join("incoming.pcap");
        std::fs::write(&source, CAPTURE_BYTES).unwrap();

        let acquirer = CaptureAcquirer::new(&db, &evidence_dir, "tcpdump", std::time::Duration::from_secs(1));
        let evidence = acquirer.import(&acme, &source).unwrap();
        assert_eq!(evidence.filename(), "Acme-Acme-Case1-1.pcap");

        let reader = acme_reader();
        let orch = AnalysisOrchestrator::new(&db, &reader, &evidence_dir, options()).unwrap();
        let record = orch.analyze(&acme, &evidence.filename()).unwrap();

        assert_eq!(record.case_name, "Acme-Case1");
        assert_eq!(record.evidence_filename, "Acme-Acme-Case1-1.pcap");
        assert!((record.syn_ack.ratio - 20.0).abs() < f64::EPSILON);
        assert_eq!(record.syn_ack.verdict, SynAckVerdict::FloodSuspected);
        assert_eq!(record.proportionality, ProportionalityVerdict::Proportional);
        assert_eq!(record.fingerprint, compute_hash(CAPTURE_BYTES, HashAlgorithm::Sha256));

        let stored = db.analyses_for_file("Acme-Case1", "Acme-Acme-Case1-1.pcap").unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn test_reanalysis_creates_independent_record() {
        let fx = fixture();
        let reader = acme_reader();
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), options()).unwrap();

        let first = orch.analyze(&fx.case, "Acme-Case1-1.pcap").unwrap();
        let second = orch.analyze(&fx.case, "Acme-Case1-1.pcap").unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(fx.db.analyses_for_case("Case1").unwrap().len(), 2);
    }

    /// Store that accepts reads but rejects every analysis write
    struct RejectingStore;

    impl EvidenceStore for RejectingStore {
        fn insert_case(&self, _: &str, _: &str, _: &str, _: &str) -> ForensicResult<Case> {
            Err(ForensicError::persist("read-only"))
        }
        fn case_by_name(&self, _: &str) -> ForensicResult<Option<Case>> {
            Ok(None)
        }
        fn list_cases(&self) -> ForensicResult<Vec<Case>> {
            Ok(Vec::new())
        }
        fn evidence_count(&self, _: &str) -> ForensicResult<u64> {
            Ok(0)
        }
        fn insert_evidence(&self, _: &str, _: &Path, _: EvidenceStatus) -> ForensicResult<EvidenceFile> {
            Err(ForensicError::persist("read-only"))
        }
        fn evidence_for_case(&self, case_name: &str) -> ForensicResult<Vec<EvidenceFile>> {
            Ok(vec![EvidenceFile {
                id: 1,
                case_name: case_name.to_string(),
                file_path: "Acme-Case1-1.pcap".to_string(),
                date: "2026-10-15".to_string(),
                status: EvidenceStatus::Collected,
            }])
        }
        fn insert_analysis(&self, _: &AnalysisRecord) -> ForensicResult<i64> {
            Err(ForensicError::Store("database is locked".into()))
        }
        fn analyses_for_case(&self, _: &str) -> ForensicResult<Vec<AnalysisRecord>> {
            Ok(Vec::new())
        }
        fn analyses_for_file(&self, _: &str, _: &str) -> ForensicResult<Vec<AnalysisRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_store_rejection_surfaces_unsaved_record() {
        let fx = fixture();
        let reader = acme_reader();
        let store = RejectingStore;
        let orch = AnalysisOrchestrator::new(&store, &reader, fx.dir.path(), options()).unwrap();

        let err = orch.analyze(&fx.case, "Acme-Case1-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "PersistError");
        let unsaved = err.unsaved_record().unwrap();
        assert!(!unsaved.is_persisted());
        assert_eq!(unsaved.syn_ack.verdict, SynAckVerdict::FloodSuspected);
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_selected_algorithm_is_recorded() {
        let fx = fixture();
        let reader = acme_reader();
        let opts = AnalysisOptions { algorithm: HashAlgorithm::Md5, ..options() };
        let orch = AnalysisOrchestrator::new(&fx.db, &reader, fx.dir.path(), opts).unwrap();

        let record = orch.analyze(&fx.case, "Acme-Case1-1.pcap").unwrap();
        assert_eq!(record.fingerprint_algorithm, "MD5");
        assert_eq!(record.fingerprint, compute_hash(CAPTURE_BYTES, HashAlgorithm::Md5));
    }
}
