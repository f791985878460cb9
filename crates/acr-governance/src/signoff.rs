//! Sign-off readiness: a system may be activated only when no blocking
//! task remains outstanding across all of its regulations.

use serde::{Deserialize, Serialize};

use acr_core::Regulation;

use crate::tasks::{GovernanceTask, TaskKind, TaskStatus};

/// A blocking task that prevents sign-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingTask {
    /// Task id.
    pub task_id: String,
    /// Regulation that requires it.
    pub regulation: Regulation,
    /// What it asks for.
    pub kind: TaskKind,
    /// Current status.
    pub status: TaskStatus,
    /// Short title.
    pub title: String,
}

/// Readiness verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOffReadiness {
    /// True when nothing blocks sign-off.
    pub ready: bool,
    /// Blocking tasks still open, in derivation order.
    pub outstanding: Vec<OutstandingTask>,
}

/// Compute readiness from a derived task list.
pub fn signoff_readiness(tasks: &[GovernanceTask]) -> SignOffReadiness {
    let outstanding: Vec<OutstandingTask> = tasks
        .iter()
        .filter(|t| t.blocking && t.status != TaskStatus::Completed)
        .map(|t| OutstandingTask {
            task_id: t.id.clone(),
            regulation: t.regulation,
            kind: t.kind,
            status: t.status,
            title: t.title.clone(),
        })
        .collect();
    SignOffReadiness {
        ready: outstanding.is_empty(),
        outstanding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::RelatedEntityType;

    fn task(id: &str, status: TaskStatus, blocking: bool) -> GovernanceTask {
        GovernanceTask {
            id: id.to_string(),
            regulation: Regulation::UkAiAct,
            kind: TaskKind::RemediatePolicy,
            title: id.to_string(),
            description: String::new(),
            status,
            blocking,
            related_entity_type: RelatedEntityType::Policy,
            related_entity_id: None,
            subject_state: String::new(),
            completion: None,
        }
    }

    #[test]
    fn empty_task_list_is_ready() {
        assert!(signoff_readiness(&[]).ready);
    }

    #[test]
    fn non_blocking_tasks_do_not_prevent_signoff() {
        let r = signoff_readiness(&[task("a", TaskStatus::Pending, false)]);
        assert!(r.ready);
        assert!(r.outstanding.is_empty());
    }

    #[test]
    fn blocking_tasks_are_listed() {
        let r = signoff_readiness(&[
            task("a", TaskStatus::Pending, true),
            task("b", TaskStatus::Blocked, true),
            task("c", TaskStatus::Pending, false),
        ]);
        assert!(!r.ready);
        let ids: Vec<&str> = r.outstanding.iter().map(|o| o.task_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
