//! Forensic Audit Logging
//!
//! Provides structured logging for chain of custody compliance.
//! Case registration, evidence acquisition, fingerprinting, analysis and
//! reporting are logged with timestamps and context.

use std::path::Path;
use tracing::{info, warn, span, Level};

/// Log a newly registered case
pub fn log_case_registered(case_name: &str, organization: &str, investigator: &str) {
    info!(
        target: "forensic_audit",
        operation = "case_registration",
        case_name = case_name,
        organization = organization,
        investigator = investigator,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Case registered"
    );
}

/// Log evidence entering storage (live capture or import)
pub fn log_evidence_acquired(
    case_name: &str,
    status: &str,
    source: Option<&Path>,
    stored_at: &Path,
    file_size: Option<u64>,
) {
    let _span = span!(
        Level::INFO,
        "evidence_acquired",
        case_name = case_name,
        path = %stored_at.display(),
    ).entered();

    info!(
        target: "forensic_audit",
        operation = "evidence_acquisition",
        case_name = case_name,
        status = status,
        source = source.map(|p| p.display().to_string()).unwrap_or_else(|| "live".to_string()),
        path = %stored_at.display(),
        file_size = file_size.unwrap_or(0),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence file stored"
    );
}

/// Log evidence fingerprint computation or verification
pub fn log_fingerprint(
    path: &Path,
    algorithm: &str,
    computed_hash: &str,
    expected_hash: Option<&str>,
    verified: Option<bool>,
) {
    let status = match verified {
        Some(true) => "VERIFIED",
        Some(false) => "MISMATCH",
        None => "COMPUTED",
    };

    info!(
        target: "forensic_audit",
        operation = "fingerprint",
        path = %path.display(),
        algorithm = algorithm,
        computed_hash = computed_hash,
        expected_hash = expected_hash.unwrap_or("none"),
        status = status,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence fingerprint computed"
    );
}

/// Log the outcome of an analysis pass
pub fn log_analysis_outcome(case_name: &str, filename: &str, recorded: bool, detail: &str) {
    if recorded {
        info!(
            target: "forensic_audit",
            operation = "analysis",
            case_name = case_name,
            filename = filename,
            outcome = "recorded",
            detail = detail,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Analysis recorded"
        );
    } else {
        warn!(
            target: "forensic_audit",
            operation = "analysis",
            case_name = case_name,
            filename = filename,
            outcome = "not_recorded",
            detail = detail,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Analysis not recorded"
        );
    }
}

/// Log report generation
pub fn log_report_generation(case_name: &str, format: &str, output_path: &Path) {
    info!(
        target: "forensic_audit",
        operation = "report_generation",
        case_name = case_name,
        format = format,
        output_path = %output_path.display(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Forensic report generated"
    );
}

/// Log security event (blocked operation, validation failure, etc.)
pub fn log_security_event(event_type: &str, description: &str, path: Option<&Path>) {
    warn!(
        target: "forensic_audit",
        event_type = "security",
        security_event = event_type,
        description = description,
        path = path.map(|p| p.display().to_string()).unwrap_or_default(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Security event"
    );
}
