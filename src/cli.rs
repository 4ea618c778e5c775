//! Command line surface
//!
//! Commands are parsed once into typed variants; nothing downstream looks
//! at raw command text.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::debug;

use crate::analysis::{AnalysisOrchestrator, AnalysisRecord, Case};
use crate::capture::{CaptureAcquirer, CaptureRequest, TcpdumpReader};
use crate::case::{self, CaseOverview};
use crate::common::{audit, is_valid_hash, resolve_evidence_file, verify_fingerprint, HashAlgorithm};
use crate::config::AppConfig;
use crate::database::{Database, EvidenceStore};
use crate::error::{ForensicError, ForensicResult};
use crate::report::{self, OutputFormat, ReportGenerator};

#[derive(Parser, Debug)]
#[command(name = "nft")]
#[command(version, about = "Network forensic tool: capture evidence and analyze it for DoS/DDoS patterns")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (file:line, thread ids)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a new case
    Register {
        #[arg(long)]
        case: String,
        #[arg(long)]
        organization: String,
        #[arg(long)]
        investigator: String,
    },

    /// List registered cases, newest first
    Cases,

    /// Show a case with its evidence files and analyses
    Show { case: String },

    /// Generate the case report
    Report {
        case: String,

        /// pdf, html, md or json
        #[arg(short, long, default_value = "pdf")]
        format: String,

        /// Output path (default: <report_dir>/<case>_report.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory with report.html / report.md overrides
        #[arg(long)]
        templates: Option<PathBuf>,
    },

    /// Re-fingerprint an evidence file and compare with its latest analysis
    Verify { case: String, filename: String },

    /// Print the effective configuration
    Config {
        /// Also write it to this path
        #[arg(long)]
        write: Option<PathBuf>,
    },

    #[command(flatten)]
    Case(CaseCommand),
}

/// Commands that act on one case's evidence
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CaseCommand {
    /// Capture live traffic into a new evidence file
    Capture {
        #[arg(long)]
        case: String,

        /// Number of packets to capture
        count: u32,

        #[arg(short, long)]
        interface: Option<String>,

        /// Target/filter expression, e.g. `src host 10.0.0.1`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filter: Vec<String>,
    },

    /// Import an existing .pcap file as evidence
    Import {
        #[arg(long)]
        case: String,
        path: PathBuf,
    },

    /// Fingerprint, extract, score and record one evidence file
    Analyze {
        #[arg(long)]
        case: String,
        filename: String,
    },

    /// Print the capture reader's rendering of an evidence file
    Display {
        #[arg(long)]
        case: String,
        filename: String,
    },
}

impl CaseCommand {
    pub fn case_name(&self) -> &str {
        match self {
            CaseCommand::Capture { case, .. }
            | CaseCommand::Import { case, .. }
            | CaseCommand::Analyze { case, .. }
            | CaseCommand::Display { case, .. } => case,
        }
    }
}

// =============================================================================
// Table rows
// =============================================================================

#[derive(Tabled)]
struct CaseRow {
    #[tabled(rename = "Case")]
    case_name: String,
    #[tabled(rename = "Organization")]
    organization: String,
    #[tabled(rename = "Investigator")]
    investigator: String,
    #[tabled(rename = "Date")]
    date: String,
}

#[derive(Tabled)]
struct EvidenceTableRow {
    #[tabled(rename = "Pcap File")]
    file: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct AnalysisSummaryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Pcap File")]
    file: String,
    #[tabled(rename = "Analyzed")]
    timestamp: String,
    #[tabled(rename = "SYN-ACK Ratio")]
    ratio: String,
    #[tabled(rename = "SYN-ACK Result")]
    syn_ack: String,
    #[tabled(rename = "Proportionality")]
    proportionality: String,
}

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    parameter: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct TalkerRow {
    #[tabled(rename = "IP")]
    address: String,
    #[tabled(rename = "Count")]
    count: u64,
}

fn parameter_rows(record: &AnalysisRecord) -> Vec<ParameterRow> {
    let c = &record.counters;
    [
        ("Case Name", record.case_name.clone()),
        ("Organization", record.organization_name.clone()),
        ("Pcap File", record.evidence_filename.clone()),
        ("Total Packets", record.total_packets.to_string()),
        ("TCP Count", c.tcp.to_string()),
        ("UDP Count", c.udp.to_string()),
        ("HTTP Count", c.http.to_string()),
        ("SYN Count", c.syn.to_string()),
        ("SYN-ACK Count", c.syn_ack.to_string()),
        ("ACK Count", c.ack.to_string()),
        ("SYN without ACK Count", c.syn_without_ack.to_string()),
        ("SYN-ACK Ratio", record.syn_ack.ratio_display()),
        ("SYN-ACK Ratio Result", record.syn_ack.verdict.as_str().to_string()),
        ("Proportionality Result", record.proportionality.as_str().to_string()),
        (
            "File Hash",
            format!("{} ({})", record.fingerprint, record.fingerprint_algorithm),
        ),
        ("Analysis Date", record.analysis_timestamp.clone()),
    ]
    .into_iter()
    .map(|(parameter, value)| ParameterRow { parameter: parameter.to_string(), value })
    .collect()
}

fn print_analysis(record: &AnalysisRecord) {
    println!("{}", Table::new(parameter_rows(record)));
    println!();
    println!("{}", "Top Talkers".bold());
    let talkers: Vec<TalkerRow> = record
        .top_talkers
        .iter()
        .map(|t| TalkerRow { address: t.address.clone(), count: t.count })
        .collect();
    println!("{}", Table::new(talkers));
    println!();

    if record.syn_ack.verdict.is_alert() {
        println!("{}", record.syn_ack.detail().red().bold());
    } else {
        println!("{}", record.syn_ack.detail().green());
    }
    if record.proportionality.is_alert() {
        println!("{} {}", "Proportionality:".red().bold(), record.proportionality.as_str());
    } else {
        println!("{} {}", "Proportionality:".green(), record.proportionality.as_str());
    }
}

fn print_overview(overview: &CaseOverview) {
    let c = &overview.case;
    println!("{} {}", "Case:".bold(), c.case_name);
    println!("  Organization: {}", c.organization_name);
    println!("  Investigator: {}", c.investigator_name);
    println!("  Date:         {}", c.date);
    println!();

    println!("{}", "Evidence".bold());
    if overview.evidence.is_empty() {
        println!("  (none)");
    } else {
        let rows: Vec<EvidenceTableRow> = overview
            .evidence
            .iter()
            .map(|e| EvidenceTableRow {
                file: e.filename(),
                date: e.date.clone(),
                status: e.status.as_str().to_string(),
            })
            .collect();
        println!("{}", Table::new(rows));
    }
    println!();

    println!("{}", "Analyses".bold());
    if overview.analyses.is_empty() {
        println!("  (none)");
    } else {
        let rows: Vec<AnalysisSummaryRow> = overview
            .analyses
            .iter()
            .map(|a| AnalysisSummaryRow {
                id: a.id.map(|id| id.to_string()).unwrap_or_default(),
                file: a.evidence_filename.clone(),
                timestamp: a.analysis_timestamp.clone(),
                ratio: a.syn_ack.ratio_display(),
                syn_ack: a.syn_ack.verdict.as_str().to_string(),
                proportionality: a.proportionality.as_str().to_string(),
            })
            .collect();
        println!("{}", Table::new(rows));
        let flagged = overview.flagged_count();
        if flagged > 0 {
            println!("{}", format!("{} analysis record(s) flagged", flagged).red().bold());
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Everything one invocation needs, constructed once and passed down
struct Session {
    config: AppConfig,
    db: Database,
}

impl Session {
    fn open(config: AppConfig) -> ForensicResult<Self> {
        config.ensure_directories()?;
        let db = Database::open(&config.database_path)?;
        Ok(Self { config, db })
    }

    fn reader(&self) -> TcpdumpReader {
        TcpdumpReader::new(&self.config.reader_tool)
    }
}

/// Run one parsed command
pub fn execute(cli: Cli) -> ForensicResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    if crate::logging::is_debug_enabled() {
        debug!(?config, "Configuration loaded");
    }

    if let Command::Config { write } = &cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        if let Some(path) = write {
            config.save(path)?;
            println!("{} {}", "Written".green().bold(), path.display());
        }
        return Ok(());
    }

    let session = Session::open(config)?;
    match cli.command {
        Command::Register { case, organization, investigator } => {
            let case = case::register_case(&session.db, &case, &organization, &investigator)?;
            println!("{} {} ({})", "Registered".green().bold(), case.case_name, case.date);
        }
        Command::Cases => {
            let rows: Vec<CaseRow> = case::list_cases(&session.db)?
                .into_iter()
                .map(|c| CaseRow {
                    case_name: c.case_name,
                    organization: c.organization_name,
                    investigator: c.investigator_name,
                    date: c.date,
                })
                .collect();
            if rows.is_empty() {
                println!("No cases registered");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        Command::Show { case } => {
            print_overview(&case::case_overview(&session.db, &case)?);
        }
        Command::Report { case, format, output, templates } => {
            let format = OutputFormat::parse(&format)?;
            let generator = match templates {
                Some(dir) => ReportGenerator::with_templates(&dir)?,
                None => ReportGenerator::new()?,
            };
            let path = report::write_case_report(
                &session.db,
                &generator,
                &case,
                format,
                &session.config.report_dir,
                output.as_deref(),
            )?;
            println!("{} {}", "Report generated:".green().bold(), path.display());
        }
        Command::Verify { case, filename } => verify(&session, &case, &filename)?,
        Command::Config { .. } => {}
        Command::Case(command) => run_case_command(&session, command)?,
    }
    Ok(())
}

fn run_case_command(session: &Session, command: CaseCommand) -> ForensicResult<()> {
    let case = case::find_case(&session.db, command.case_name())?;
    let config = &session.config;

    match command {
        CaseCommand::Capture { count, interface, filter, .. } => {
            let request = CaptureRequest::new(count, interface, filter)?;
            let acquirer = CaptureAcquirer::new(
                &session.db,
                &config.evidence_dir,
                &config.capture_tool,
                config.capture_timeout(),
            );
            let evidence = acquirer.capture(&case, &request)?;
            println!("{} {} ({} packets)", "Captured".green().bold(), evidence.filename(), count);
        }
        CaseCommand::Import { path, .. } => {
            let acquirer = CaptureAcquirer::new(
                &session.db,
                &config.evidence_dir,
                &config.capture_tool,
                config.capture_timeout(),
            );
            let evidence = acquirer.import(&case, &path)?;
            println!("{} {} as {}", "Imported".green().bold(), path.display(), evidence.filename());
        }
        CaseCommand::Analyze { filename, .. } => {
            let reader = session.reader();
            let orchestrator = AnalysisOrchestrator::new(
                &session.db,
                &reader,
                &config.evidence_dir,
                config.analysis_options()?,
            )?;
            let record = orchestrator.analyze(&case, &filename)?;
            print_analysis(&record);
        }
        CaseCommand::Display { filename, .. } => {
            let path = owned_evidence_path(session, &case, &filename)?;
            session.reader().display(&path)?;
        }
    }
    Ok(())
}

/// Resolve `filename` in the evidence directory, refusing files the case does not own
fn owned_evidence_path(session: &Session, case: &Case, filename: &str) -> ForensicResult<PathBuf> {
    let path = resolve_evidence_file(&session.config.evidence_dir, filename)?;
    case::owned_evidence(&session.db, case, filename)?;
    Ok(path)
}

fn verify(session: &Session, case_name: &str, filename: &str) -> ForensicResult<()> {
    let case = case::find_case(&session.db, case_name)?;
    let latest = session
        .db
        .analyses_for_file(&case.case_name, filename.trim())?
        .pop()
        .ok_or_else(|| ForensicError::not_found(format!("analysis of '{}' in case '{}'", filename, case.case_name)))?;

    let algorithm: HashAlgorithm = latest.fingerprint_algorithm.parse().map_err(ForensicError::Format)?;
    if !is_valid_hash(&latest.fingerprint, algorithm) {
        return Err(ForensicError::Format(format!(
            "recorded {} fingerprint '{}' is malformed",
            algorithm.name(),
            latest.fingerprint
        )));
    }
    let path = owned_evidence_path(session, &case, filename)?;
    let outcome = verify_fingerprint(&path, algorithm, &latest.fingerprint, session.config.hash_chunk_size)?;
    audit::log_fingerprint(
        &path,
        &outcome.algorithm,
        &outcome.computed,
        Some(&outcome.expected),
        Some(outcome.matches),
    );

    if outcome.matches {
        println!("{} {} {}", "VERIFIED".green().bold(), outcome.algorithm, outcome.computed);
        Ok(())
    } else {
        println!("{}", "MISMATCH".red().bold());
        println!("  recorded: {}", outcome.expected);
        println!("  computed: {}", outcome.computed);
        Err(ForensicError::Format(format!(
            "{} no longer matches the fingerprint recorded at {}",
            filename, latest.analysis_timestamp
        )))
    }
}

/// Print an error the way the CLI reports it. A computed but unpersisted
/// analysis is still shown, under a warning banner.
pub fn report_error(err: &ForensicError) {
    eprintln!("{} {}", format!("{}:", err.kind()).red().bold(), err);
    if let Some(record) = err.unsaved_record() {
        eprintln!();
        eprintln!("{}", "=== NOT RECORDED: this analysis was NOT saved to the case store ===".red().bold());
        print_analysis(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_with_filter() {
        let cli = Cli::try_parse_from([
            "nft", "capture", "--case", "Case1", "100", "-i", "eth0", "src", "host", "10.0.0.1",
        ])
        .unwrap();
        match cli.command {
            Command::Case(cmd @ CaseCommand::Capture { .. }) => {
                assert_eq!(cmd.case_name(), "Case1");
                if let CaseCommand::Capture { count, interface, filter, .. } = cmd {
                    assert_eq!(count, 100);
                    assert_eq!(interface.as_deref(), Some("eth0"));
                    assert_eq!(filter, vec!["src", "host", "10.0.0.1"]);
                }
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_analyze_requires_case() {
        assert!(Cli::try_parse_from(["nft", "analyze", "Acme-Case1-1.pcap"]).is_err());
        let cli = Cli::try_parse_from(["nft", "analyze", "--case", "C", "Acme-C-1.pcap"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Case(CaseCommand::Analyze { ref filename, .. }) if filename == "Acme-C-1.pcap"
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["nft", "cases", "--config", "/tmp/c.json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
    }

    #[test]
    fn test_parameter_rows_cover_record() {
        let rows = parameter_rows(&AnalysisRecord::sample());
        let ratio = rows.iter().find(|r| r.parameter == "SYN-ACK Ratio").unwrap();
        assert_eq!(ratio.value, "20.0000");
        assert_eq!(rows.len(), 16);
    }

    fn session_in(dir: &std::path::Path) -> Session {
        let config = AppConfig {
            database_path: dir.join("nft.db"),
            evidence_dir: dir.join("outputs"),
            report_dir: dir.join("reports"),
            ..AppConfig::default()
        };
        Session::open(config).unwrap()
    }

    #[test]
    fn test_verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        case::register_case(&session.db, "Acme-Case1", "Acme", "J. Doe").unwrap();

        let file = session.config.evidence_dir.join("Acme-Acme-Case1-1.pcap");
        std::fs::write(&file, b"original bytes").unwrap();
        session
            .db
            .insert_evidence("Acme-Case1", &file, crate::analysis::EvidenceStatus::Imported)
            .unwrap();
        let mut record = AnalysisRecord::sample();
        record.fingerprint = crate::common::compute_hash(b"original bytes", HashAlgorithm::Sha256);
        session.db.insert_analysis(&record).unwrap();

        verify(&session, "Acme-Case1", "Acme-Acme-Case1-1.pcap").unwrap();

        std::fs::write(&file, b"tampered bytes").unwrap();
        let err = verify(&session, "Acme-Case1", "Acme-Acme-Case1-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "FormatError");
    }

    #[test]
    fn test_verify_without_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        case::register_case(&session.db, "C", "O", "I").unwrap();
        let err = verify(&session, "C", "O-C-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[test]
    fn test_verify_rejects_malformed_recorded_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        case::register_case(&session.db, "Acme-Case1", "Acme", "J. Doe").unwrap();
        let mut record = AnalysisRecord::sample();
        record.fingerprint = "not-a-digest".to_string();
        session.db.insert_analysis(&record).unwrap();

        let err = verify(&session, "Acme-Case1", "Acme-Acme-Case1-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "FormatError");
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_evidence_path_refuses_other_cases_files() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        let alpha = case::register_case(&session.db, "CaseA", "Alpha", "J. Doe").unwrap();
        let beta = case::register_case(&session.db, "CaseB", "Beta", "R. Roe").unwrap();
        let file = session.config.evidence_dir.join("Beta-CaseB-1.pcap");
        std::fs::write(&file, b"pcap").unwrap();
        session
            .db
            .insert_evidence("CaseB", &file, crate::analysis::EvidenceStatus::Collected)
            .unwrap();

        assert_eq!(owned_evidence_path(&session, &beta, "Beta-CaseB-1.pcap").unwrap(), file);
        let err = owned_evidence_path(&session, &alpha, "Beta-CaseB-1.pcap").unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }
}
