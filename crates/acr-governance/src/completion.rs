//! # Task Completion
//!
//! The only persisted fact about governance tasks. An attestation is keyed
//! by `(system, task id)` and merged into the derived list on every read;
//! list position plays no part. It only counts while the task's
//! `subject_state` still equals the one it attested.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use acr_core::{validate_evidence_uri, ActorId, SystemId, Timestamp};

use crate::error::TaskError;
use crate::tasks::{GovernanceTask, TaskStatus};

/// Who completed a task, when, and with what evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAttestation {
    /// Derived task id.
    pub task_id: String,
    /// Owning system.
    pub system_id: SystemId,
    /// Attesting actor.
    pub completed_by: ActorId,
    /// Attestation time.
    pub completed_at: Timestamp,
    /// Optional evidence URI.
    pub evidence_link: Option<String>,
    /// `subject_state` of the task when it was completed.
    pub attested_state: String,
}

/// Completion side-table.
#[derive(Debug, Clone, Default)]
pub struct CompletionLedger {
    entries: BTreeMap<(SystemId, String), CompletionAttestation>,
}

impl CompletionLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attestation recorded for a task, if any.
    pub fn get(&self, system_id: SystemId, task_id: &str) -> Option<&CompletionAttestation> {
        self.entries.get(&(system_id, task_id.to_string()))
    }

    /// Record an attestation, replacing any previous one for the same task.
    pub fn record(&mut self, attestation: CompletionAttestation) {
        self.entries.insert(
            (attestation.system_id, attestation.task_id.clone()),
            attestation,
        );
    }

    /// All attestations for one system, ordered by task id.
    pub fn for_system(&self, system_id: SystemId) -> Vec<&CompletionAttestation> {
        self.entries
            .values()
            .filter(|a| a.system_id == system_id)
            .collect()
    }

    /// Number of attestations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CompletionAttestation> for CompletionLedger {
    fn from_iter<I: IntoIterator<Item = CompletionAttestation>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for attestation in iter {
            ledger.record(attestation);
        }
        ledger
    }
}

/// Build an attestation for `task_id` against the currently derived tasks.
///
/// The task must be derivable right now, pending, and of a kind an
/// attestation can resolve. Any evidence link must parse as a URI. The
/// caller records the result in the ledger.
pub fn complete_task(
    tasks: &[GovernanceTask],
    system_id: SystemId,
    task_id: &str,
    actor: &ActorId,
    evidence_link: Option<&str>,
) -> Result<CompletionAttestation, TaskError> {
    let task = tasks
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| TaskError::NotFound {
            system_id,
            task_id: task_id.to_string(),
        })?;

    match task.status {
        TaskStatus::Pending => {}
        TaskStatus::Blocked => {
            return Err(TaskError::InvalidState {
                task_id: task.id.clone(),
                status: task.status,
                reason: "blocked tasks cannot be completed".to_string(),
            })
        }
        TaskStatus::Completed => {
            return Err(TaskError::InvalidState {
                task_id: task.id.clone(),
                status: task.status,
                reason: "task is already completed".to_string(),
            })
        }
    }

    if !task.kind.is_attestable() {
        return Err(TaskError::InvalidState {
            task_id: task.id.clone(),
            status: task.status,
            reason: format!(
                "{} tasks are resolved by the record transition, not by attestation",
                task.kind
            ),
        });
    }

    let evidence_link = evidence_link
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(validate_evidence_uri)
        .transpose()
        .map_err(|e| TaskError::Validation(e.to_string()))?;

    Ok(CompletionAttestation {
        task_id: task.id.clone(),
        system_id,
        completed_by: actor.clone(),
        completed_at: Timestamp::now(),
        evidence_link,
        attested_state: task.subject_state.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{RelatedEntityType, TaskKind};
    use acr_core::Regulation;

    fn actor(name: &str) -> ActorId {
        ActorId::new(name).unwrap()
    }

    fn task(id: &str, status: TaskStatus) -> GovernanceTask {
        task_of_kind(id, TaskKind::GenerateDocument, status)
    }

    fn task_of_kind(id: &str, kind: TaskKind, status: TaskStatus) -> GovernanceTask {
        GovernanceTask {
            id: id.to_string(),
            regulation: Regulation::EuAiAct,
            kind,
            title: "Generate".to_string(),
            description: String::new(),
            status,
            blocking: false,
            related_entity_type: RelatedEntityType::None,
            related_entity_id: None,
            subject_state: "v1".to_string(),
            completion: None,
        }
    }

    #[test]
    fn completes_pending_task_with_evidence() {
        let sys = SystemId::new();
        let tasks = vec![task(
            "eu_ai_act:ai_system_card:generate_document",
            TaskStatus::Pending,
        )];
        let att = complete_task(
            &tasks,
            sys,
            "eu_ai_act:ai_system_card:generate_document",
            &actor("carol"),
            Some(" https://wiki.example.com/card "),
        )
        .unwrap();
        assert_eq!(
            att.evidence_link.as_deref(),
            Some("https://wiki.example.com/card")
        );
        assert_eq!(att.completed_by, actor("carol"));
        assert_eq!(att.attested_state, "v1");

        let mut ledger = CompletionLedger::new();
        ledger.record(att);
        assert!(ledger
            .get(sys, "eu_ai_act:ai_system_card:generate_document")
            .is_some());
        assert!(ledger
            .get(SystemId::new(), "eu_ai_act:ai_system_card:generate_document")
            .is_none());
    }

    #[test]
    fn unknown_task_is_not_found() {
        let err = complete_task(
            &[],
            SystemId::new(),
            "mas:bias:complete_assessment",
            &actor("a"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
    }

    #[test]
    fn blocked_and_completed_tasks_are_refused() {
        let tasks = vec![
            task("t-blocked", TaskStatus::Blocked),
            task("t-done", TaskStatus::Completed),
        ];
        for id in ["t-blocked", "t-done"] {
            let err = complete_task(&tasks, SystemId::new(), id, &actor("a"), None).unwrap_err();
            assert!(matches!(err, TaskError::InvalidState { .. }));
        }
    }

    #[test]
    fn transition_resolved_tasks_are_refused() {
        for kind in [
            TaskKind::SubmitAssessment,
            TaskKind::ReviewAssessment,
            TaskKind::RegenerateDocument,
            TaskKind::ResolveProhibition,
        ] {
            let tasks = vec![task_of_kind("t", kind, TaskStatus::Pending)];
            let err = complete_task(&tasks, SystemId::new(), "t", &actor("a"), None).unwrap_err();
            assert!(
                matches!(err, TaskError::InvalidState { .. }),
                "{kind} must not be attestable"
            );
        }
        for kind in [
            TaskKind::CompleteAssessment,
            TaskKind::TrackMitigation,
            TaskKind::GenerateDocument,
            TaskKind::AssessPolicy,
            TaskKind::RemediatePolicy,
        ] {
            let tasks = vec![task_of_kind("t", kind, TaskStatus::Pending)];
            assert!(complete_task(&tasks, SystemId::new(), "t", &actor("a"), None).is_ok());
        }
    }

    #[test]
    fn malformed_evidence_is_rejected() {
        let tasks = vec![task("t", TaskStatus::Pending)];
        let err = complete_task(&tasks, SystemId::new(), "t", &actor("a"), Some("not a uri"))
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[test]
    fn blank_evidence_is_treated_as_absent() {
        let tasks = vec![task("t", TaskStatus::Pending)];
        let att = complete_task(&tasks, SystemId::new(), "t", &actor("a"), Some("  ")).unwrap();
        assert_eq!(att.evidence_link, None);
    }

    #[test]
    fn ledger_is_keyed_per_system() {
        let (a, b) = (SystemId::new(), SystemId::new());
        let ledger: CompletionLedger = [a, b, a]
            .into_iter()
            .enumerate()
            .map(|(i, sys)| CompletionAttestation {
                task_id: format!("task-{}", i % 2),
                system_id: sys,
                completed_by: actor("a"),
                completed_at: Timestamp::now(),
                evidence_link: None,
                attested_state: String::new(),
            })
            .collect();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.for_system(a).len(), 2);
        assert_eq!(ledger.for_system(b).len(), 1);
    }
}
