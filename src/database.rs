//! SQLite case/evidence store
//!
//! Handles:
//! - Registration (cases, unique by name)
//! - Evidence files (captures owned by a case)
//! - Analysis records (immutable snapshots of one analysis pass)
//!
//! Every write is a single-row INSERT, so each one lands completely or not at
//! all. Nothing is ever updated or deleted in-band.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::analysis::{
    AnalysisRecord, Case, EvidenceFile, EvidenceStatus, ProportionalityVerdict,
    SynAckAssessment, SynAckVerdict, TrafficCounters,
};
use crate::error::{ForensicError, ForensicResult};

/// Persistence consumed by acquisition, analysis and reporting.
///
/// Passed explicitly to every component that needs it; there is no global
/// connection.
pub trait EvidenceStore {
    fn insert_case(
        &self,
        case_name: &str,
        organization_name: &str,
        investigator_name: &str,
        date: &str,
    ) -> ForensicResult<Case>;

    fn case_by_name(&self, case_name: &str) -> ForensicResult<Option<Case>>;

    /// Newest first
    fn list_cases(&self) -> ForensicResult<Vec<Case>>;

    fn evidence_count(&self, case_name: &str) -> ForensicResult<u64>;

    fn insert_evidence(
        &self,
        case_name: &str,
        file_path: &Path,
        status: EvidenceStatus,
    ) -> ForensicResult<EvidenceFile>;

    fn evidence_for_case(&self, case_name: &str) -> ForensicResult<Vec<EvidenceFile>>;

    /// Write one analysis record; returns its row id
    fn insert_analysis(&self, record: &AnalysisRecord) -> ForensicResult<i64>;

    fn analyses_for_case(&self, case_name: &str) -> ForensicResult<Vec<AnalysisRecord>>;

    fn analyses_for_file(&self, case_name: &str, filename: &str) -> ForensicResult<Vec<AnalysisRecord>>;
}

/// Database connection wrapper for thread-safe access
pub struct Database {
    conn: Mutex<Connection>,
}

const ANALYSIS_COLUMNS: &str = "id, case_name, organization_name, evidence_filename, total_packets,
    top_talkers_serialized, tcp_count, udp_count, http_count, syn_count, syn_ack_count, ack_count,
    syn_without_ack_count, syn_ack_ratio, syn_ack_verdict, proportionality_verdict,
    fingerprint_algorithm, fingerprint, analysis_timestamp";

impl Database {
    /// Open (or create) the database at the given path
    pub fn open(db_path: &Path) -> ForensicResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ForensicError::io(parent, e))?;
            }
        }

        info!(path = %db_path.display(), "Opening evidence store");
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> ForensicResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ForensicResult<Self> {
        let db = Database { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> ForensicResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ForensicError::Store(format!("connection lock poisoned: {}", e)))
    }

    /// Create all tables if they don't exist
    fn init_schema(&self) -> ForensicResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(r#"
            PRAGMA foreign_keys = ON;

            -- Registered cases
            CREATE TABLE IF NOT EXISTS registration (
                id INTEGER PRIMARY KEY,
                case_name TEXT NOT NULL UNIQUE,
                organization_name TEXT NOT NULL,
                investigator_name TEXT NOT NULL,
                date TEXT NOT NULL
            );

            -- Evidence files (captured or imported)
            CREATE TABLE IF NOT EXISTS evidence_file (
                id INTEGER PRIMARY KEY,
                case_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                date TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('collected', 'imported')),
                FOREIGN KEY (case_name) REFERENCES registration(case_name)
            );

            -- Analysis records (immutable snapshots)
            CREATE TABLE IF NOT EXISTS analysis_record (
                id INTEGER PRIMARY KEY,
                case_name TEXT NOT NULL,
                organization_name TEXT NOT NULL,
                evidence_filename TEXT NOT NULL,
                total_packets INTEGER NOT NULL,
                top_talkers_serialized TEXT NOT NULL,
                tcp_count INTEGER NOT NULL,
                udp_count INTEGER NOT NULL,
                http_count INTEGER NOT NULL,
                syn_count INTEGER NOT NULL,
                syn_ack_count INTEGER NOT NULL,
                ack_count INTEGER NOT NULL,
                syn_without_ack_count INTEGER NOT NULL,
                syn_ack_ratio REAL NOT NULL,
                syn_ack_verdict TEXT NOT NULL,
                proportionality_verdict TEXT NOT NULL,
                fingerprint_algorithm TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                analysis_timestamp TEXT NOT NULL,
                FOREIGN KEY (case_name) REFERENCES registration(case_name)
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_case ON evidence_file(case_name);
            CREATE INDEX IF NOT EXISTS idx_analysis_case ON analysis_record(case_name);
            CREATE INDEX IF NOT EXISTS idx_analysis_file ON analysis_record(case_name, evidence_filename);
        "#)?;

        Ok(())
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let v: i64 = row.get(idx)?;
    Ok(v.max(0) as u64)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<Case> {
    Ok(Case {
        id: row.get(0)?,
        case_name: row.get(1)?,
        organization_name: row.get(2)?,
        investigator_name: row.get(3)?,
        date: row.get(4)?,
    })
}

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<EvidenceFile> {
    let status: String = row.get(4)?;
    Ok(EvidenceFile {
        id: row.get(0)?,
        case_name: row.get(1)?,
        file_path: row.get(2)?,
        date: row.get(3)?,
        status: EvidenceStatus::parse(&status)
            .ok_or_else(|| conversion_error(4, format!("unknown evidence status '{}'", status)))?,
    })
}

fn analysis_from_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    let top_talkers: String = row.get(5)?;
    let top_talkers = AnalysisRecord::parse_top_talkers(&top_talkers)
        .map_err(|e| conversion_error(5, format!("top talkers: {}", e)))?;

    let counters = TrafficCounters {
        tcp: count_at(row, 6)?,
        udp: count_at(row, 7)?,
        http: count_at(row, 8)?,
        syn: count_at(row, 9)?,
        syn_ack: count_at(row, 10)?,
        ack: count_at(row, 11)?,
        syn_without_ack: count_at(row, 12)?,
    };

    let syn_ack_verdict: String = row.get(14)?;
    let proportionality: String = row.get(15)?;

    Ok(AnalysisRecord {
        id: Some(row.get(0)?),
        case_name: row.get(1)?,
        organization_name: row.get(2)?,
        evidence_filename: row.get(3)?,
        total_packets: count_at(row, 4)?,
        top_talkers,
        syn_ack: SynAckAssessment {
            ratio: row.get(13)?,
            defined: counters.syn_ack > 0,
            verdict: SynAckVerdict::parse(&syn_ack_verdict)
                .ok_or_else(|| conversion_error(14, format!("unknown verdict '{}'", syn_ack_verdict)))?,
        },
        proportionality: ProportionalityVerdict::parse(&proportionality)
            .ok_or_else(|| conversion_error(15, format!("unknown verdict '{}'", proportionality)))?,
        counters,
        fingerprint_algorithm: row.get(16)?,
        fingerprint: row.get(17)?,
        analysis_timestamp: row.get(18)?,
    })
}

impl EvidenceStore for Database {
    fn insert_case(
        &self,
        case_name: &str,
        organization_name: &str,
        investigator_name: &str,
        date: &str,
    ) -> ForensicResult<Case> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO registration (case_name, organization_name, investigator_name, date)
             VALUES (?1, ?2, ?3, ?4)",
            params![case_name, organization_name, investigator_name, date],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ForensicError::DuplicateCase(case_name.to_string())
            } else {
                ForensicError::persist(e.to_string())
            }
        })?;

        let id = conn.last_insert_rowid();
        debug!(id, case_name, "Case row inserted");
        Ok(Case {
            id,
            case_name: case_name.to_string(),
            organization_name: organization_name.to_string(),
            investigator_name: investigator_name.to_string(),
            date: date.to_string(),
        })
    }

    fn case_by_name(&self, case_name: &str) -> ForensicResult<Option<Case>> {
        let conn = self.conn()?;
        let case = conn
            .query_row(
                "SELECT id, case_name, organization_name, investigator_name, date
                 FROM registration WHERE case_name = ?1",
                params![case_name],
                case_from_row,
            )
            .optional()?;
        Ok(case)
    }

    fn list_cases(&self) -> ForensicResult<Vec<Case>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, case_name, organization_name, investigator_name, date
             FROM registration ORDER BY date DESC, id DESC",
        )?;
        let rows = stmt.query_map([], case_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn evidence_count(&self, case_name: &str) -> ForensicResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM evidence_file WHERE case_name = ?1",
            params![case_name],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn insert_evidence(
        &self,
        case_name: &str,
        file_path: &Path,
        status: EvidenceStatus,
    ) -> ForensicResult<EvidenceFile> {
        let conn = self.conn()?;
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let path = file_path.to_string_lossy().to_string();

        conn.execute(
            "INSERT INTO evidence_file (case_name, file_path, date, status) VALUES (?1, ?2, ?3, ?4)",
            params![case_name, path, date, status.as_str()],
        )
        .map_err(|e| ForensicError::persist(e.to_string()))?;

        Ok(EvidenceFile {
            id: conn.last_insert_rowid(),
            case_name: case_name.to_string(),
            file_path: path,
            date,
            status,
        })
    }

    fn evidence_for_case(&self, case_name: &str) -> ForensicResult<Vec<EvidenceFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, case_name, file_path, date, status
             FROM evidence_file WHERE case_name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![case_name], evidence_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_analysis(&self, record: &AnalysisRecord) -> ForensicResult<i64> {
        let top_talkers = record
            .top_talkers_json()
            .map_err(|e| ForensicError::persist(format!("top talkers: {}", e)))?;

        let conn = self.conn()?;
        let c = &record.counters;
        conn.execute(
            "INSERT INTO analysis_record (case_name, organization_name, evidence_filename, total_packets,
                top_talkers_serialized, tcp_count, udp_count, http_count, syn_count, syn_ack_count,
                ack_count, syn_without_ack_count, syn_ack_ratio, syn_ack_verdict,
                proportionality_verdict, fingerprint_algorithm, fingerprint, analysis_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                record.case_name,
                record.organization_name,
                record.evidence_filename,
                to_sql_count(record.total_packets),
                top_talkers,
                to_sql_count(c.tcp),
                to_sql_count(c.udp),
                to_sql_count(c.http),
                to_sql_count(c.syn),
                to_sql_count(c.syn_ack),
                to_sql_count(c.ack),
                to_sql_count(c.syn_without_ack),
                record.syn_ack.ratio,
                record.syn_ack.verdict.as_str(),
                record.proportionality.as_str(),
                record.fingerprint_algorithm,
                record.fingerprint,
                record.analysis_timestamp,
            ],
        )
        .map_err(|e| ForensicError::persist(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn analyses_for_case(&self, case_name: &str) -> ForensicResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM analysis_record WHERE case_name = ?1 ORDER BY id",
            ANALYSIS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![case_name], analysis_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn analyses_for_file(&self, case_name: &str, filename: &str) -> ForensicResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM analysis_record WHERE case_name = ?1 AND evidence_filename = ?2 ORDER BY id",
            ANALYSIS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![case_name, filename], analysis_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_case() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_case("Acme-Case1", "Acme", "J. Doe", "2026-10-15").unwrap();
        db
    }

    #[test]
    fn test_case_name_is_unique() {
        let db = db_with_case();
        let err = db.insert_case("Acme-Case1", "Other", "X", "2026-10-16").unwrap_err();
        assert!(matches!(err, ForensicError::DuplicateCase(ref n) if n == "Acme-Case1"));
        assert_eq!(db.list_cases().unwrap().len(), 1);
    }

    #[test]
    fn test_list_cases_newest_first() {
        let db = db_with_case();
        db.insert_case("Later", "Acme", "J. Doe", "2026-11-01").unwrap();
        db.insert_case("Earlier", "Acme", "J. Doe", "2026-01-01").unwrap();
        let names: Vec<String> = db.list_cases().unwrap().into_iter().map(|c| c.case_name).collect();
        assert_eq!(names, vec!["Later", "Acme-Case1", "Earlier"]);
    }

    #[test]
    fn test_evidence_requires_existing_case() {
        let db = db_with_case();
        let err = db
            .insert_evidence("Nope", Path::new("/x/a.pcap"), EvidenceStatus::Imported)
            .unwrap_err();
        assert_eq!(err.kind(), "PersistError");

        db.insert_evidence("Acme-Case1", Path::new("/x/a.pcap"), EvidenceStatus::Collected)
            .unwrap();
        assert_eq!(db.evidence_count("Acme-Case1").unwrap(), 1);
        let files = db.evidence_for_case("Acme-Case1").unwrap();
        assert_eq!(files[0].status, EvidenceStatus::Collected);
    }

    #[test]
    fn test_analysis_round_trips_structured_fields() {
        let db = db_with_case();
        let record = AnalysisRecord::sample();
        let id = db.insert_analysis(&record).unwrap();

        let stored = db.analyses_for_case("Acme-Case1").unwrap();
        assert_eq!(stored.len(), 1);
        let got = &stored[0];
        assert_eq!(got.id, Some(id));
        assert_eq!(got.top_talkers, record.top_talkers);
        assert_eq!(got.counters, record.counters);
        assert_eq!(got.syn_ack, record.syn_ack);
        assert_eq!(got.proportionality, record.proportionality);
        assert_eq!(got.fingerprint, record.fingerprint);
    }

    #[test]
    fn test_reanalysis_appends_new_record() {
        let db = db_with_case();
        let record = AnalysisRecord::sample();
        let first = db.insert_analysis(&record).unwrap();
        let second = db.insert_analysis(&record).unwrap();
        assert_ne!(first, second);
        let rows = db.analyses_for_file("Acme-Case1", &record.evidence_filename).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_analysis_for_unknown_case_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db.insert_analysis(&AnalysisRecord::sample()).unwrap_err();
        assert_eq!(err.kind(), "PersistError");
        assert!(db.analyses_for_case("Acme-Case1").unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nft.db");
        let db = Database::open(&path).unwrap();
        db.insert_case("C", "O", "I", "2026-10-15").unwrap();
        assert!(path.exists());
    }
}
