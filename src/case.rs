//! Case registration and lookup

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{AnalysisRecord, Case, EvidenceFile};
use crate::common::audit;
use crate::database::EvidenceStore;
use crate::error::{ForensicError, ForensicResult};

/// Everything stored for one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseOverview {
    pub case: Case,
    pub evidence: Vec<EvidenceFile>,
    pub analyses: Vec<AnalysisRecord>,
}

impl CaseOverview {
    /// Analyses that raised either alert
    pub fn flagged_count(&self) -> usize {
        self.analyses
            .iter()
            .filter(|a| a.syn_ack.verdict.is_alert() || a.proportionality.is_alert())
            .count()
    }
}

fn required<'v>(field: &str, value: &'v str) -> ForensicResult<&'v str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ForensicError::Format(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

/// Register a new case dated today
pub fn register_case(
    store: &dyn EvidenceStore,
    case_name: &str,
    organization_name: &str,
    investigator_name: &str,
) -> ForensicResult<Case> {
    let case_name = required("case name", case_name)?;
    let organization_name = required("organization name", organization_name)?;
    let investigator_name = required("investigator name", investigator_name)?;

    if store.case_by_name(case_name)?.is_some() {
        return Err(ForensicError::DuplicateCase(case_name.to_string()));
    }

    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let case = store.insert_case(case_name, organization_name, investigator_name, &date)?;

    audit::log_case_registered(&case.case_name, &case.organization_name, &case.investigator_name);
    info!(id = case.id, case = %case.case_name, "Case registered");
    Ok(case)
}

/// All cases, newest first
pub fn list_cases(store: &dyn EvidenceStore) -> ForensicResult<Vec<Case>> {
    store.list_cases()
}

pub fn find_case(store: &dyn EvidenceStore, case_name: &str) -> ForensicResult<Case> {
    store
        .case_by_name(case_name.trim())?
        .ok_or_else(|| ForensicError::not_found(format!("case '{}'", case_name.trim())))
}

/// The evidence row `filename` refers to, provided `case` owns it
pub fn owned_evidence(store: &dyn EvidenceStore, case: &Case, filename: &str) -> ForensicResult<EvidenceFile> {
    let name = filename.trim();
    store
        .evidence_for_case(&case.case_name)?
        .into_iter()
        .find(|ev| ev.filename() == name)
        .ok_or_else(|| {
            warn!(case = %case.case_name, filename = name, "Evidence file not owned by case");
            ForensicError::not_found(format!("evidence file '{}' in case '{}'", name, case.case_name))
        })
}

pub fn case_overview(store: &dyn EvidenceStore, case_name: &str) -> ForensicResult<CaseOverview> {
    let case = find_case(store, case_name)?;
    let evidence = store.evidence_for_case(&case.case_name)?;
    let analyses = store.analyses_for_case(&case.case_name)?;
    Ok(CaseOverview { case, evidence, analyses })
}
