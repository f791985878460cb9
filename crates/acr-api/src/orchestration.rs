//! # Cross-Store Orchestration
//!
//! Helpers shared by the route handlers: loading everything the task
//! deriver and staleness engine read for one system, evaluating documents,
//! appending to the audit trail, and mapping write-through results.
//!
//! Reads take a snapshot of each store in turn. A write that lands between
//! two of those reads is picked up on the next read; nothing here caches.

use std::fmt::Display;

use acr_core::{RulesetCatalog, SystemId};
use acr_governance::{derive_all, AuditEntry, DerivationInput, GovernanceTask};
use acr_state::{
    evaluate_staleness, AiSystem, ComplianceDocumentation, Policy, PolicyMapping, RiskAssessment,
    StalenessReport,
};

use crate::error::AppError;
use crate::state::AppState;

/// Fetch a system or fail with 404.
pub(crate) fn system_or_404(state: &AppState, id: SystemId) -> Result<AiSystem, AppError> {
    state
        .systems
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("ai system {id} not found")))
}

/// All assessments of one system, oldest first.
pub(crate) fn assessments_of(state: &AppState, id: SystemId) -> Vec<RiskAssessment> {
    let mut rows = state.assessments.filter(|a| a.system_id == id);
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    rows
}

/// Everything derived views read for one system.
pub(crate) struct SystemSnapshot {
    pub system: AiSystem,
    pub assessments: Vec<RiskAssessment>,
    pub documents: Vec<ComplianceDocumentation>,
    pub policies: Vec<Policy>,
    pub mappings: Vec<PolicyMapping>,
}

impl SystemSnapshot {
    /// Read the system and its related rows.
    pub(crate) fn load(state: &AppState, id: SystemId) -> Result<Self, AppError> {
        let system = system_or_404(state, id)?;
        let assessments = assessments_of(state, id);
        let documents = state.documents.filter(|d| d.system_id == id);
        let mut mappings = state.mappings.filter(|m| m.system_id == id);
        mappings.sort_by_key(|m| m.id);
        let policies = mappings
            .iter()
            .filter_map(|m| state.policies.get(&m.policy_id))
            .collect();
        Ok(Self {
            system,
            assessments,
            documents,
            policies,
            mappings,
        })
    }

    /// Borrow the snapshot as task-deriver input.
    pub(crate) fn input<'a>(&'a self, rulesets: &'a RulesetCatalog) -> DerivationInput<'a> {
        DerivationInput {
            system: &self.system,
            assessments: &self.assessments,
            documents: &self.documents,
            policies: &self.policies,
            mappings: &self.mappings,
            rulesets,
        }
    }

    /// Derive governance tasks across all applicable regulations, merging
    /// the completion ledger.
    pub(crate) fn tasks(&self, state: &AppState) -> Result<Vec<GovernanceTask>, AppError> {
        let ledger = state.completions.read();
        Ok(derive_all(&self.input(&state.rulesets), &ledger)?)
    }
}

/// Staleness of one document against the current system and assessments.
pub(crate) fn evaluate_document(
    document: &ComplianceDocumentation,
    system: &AiSystem,
    assessments: &[RiskAssessment],
    rulesets: &RulesetCatalog,
) -> Result<StalenessReport, AppError> {
    evaluate_staleness(document, system, assessments, rulesets).map_err(|e| {
        AppError::Internal(format!("staleness evaluation for document {} failed: {e}", document.id))
    })
}

/// Append an entry to the audit trail.
pub(crate) fn audit(state: &AppState, entry: AuditEntry) {
    state.audit.lock().append(entry);
}

/// Map the result of an unconditional write-through.
pub(crate) fn persisted(
    result: Result<(), sqlx::Error>,
    entity: &str,
    id: impl Display,
) -> Result<(), AppError> {
    result.map_err(|e| {
        tracing::error!(entity, id = %id, error = %e, "failed to persist record");
        AppError::Internal(format!("database error persisting {entity} {id}"))
    })
}

/// Map the result of a write-through conditional on the stored revision.
/// Zero affected rows means another writer changed the row first.
pub(crate) fn persisted_conditional(
    result: Result<bool, sqlx::Error>,
    entity: &str,
    id: impl Display,
) -> Result<(), AppError> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!(entity, id = %id, "conditional update matched no rows");
            Err(AppError::Conflict(format!(
                "{entity} {id} was modified concurrently; re-read and retry"
            )))
        }
        Err(e) => {
            tracing::error!(entity, id = %id, error = %e, "failed to persist record");
            Err(AppError::Internal(format!("database error persisting {entity} {id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_a_conflict() {
        let err = persisted_conditional(Ok(false), "risk assessment", "a-1").unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("a-1")));
        assert!(persisted_conditional(Ok(true), "risk assessment", "a-1").is_ok());
    }

    #[test]
    fn database_errors_are_internal() {
        let err = persisted(Err(sqlx::Error::RowNotFound), "policy", "p-1").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        let err =
            persisted_conditional(Err(sqlx::Error::PoolTimedOut), "policy", "p-1").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn unknown_system_is_not_found() {
        let state = AppState::new();
        let err = SystemSnapshot::load(&state, SystemId::new()).err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
