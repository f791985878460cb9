//! # Policy Mappings
//!
//! Organisational policies (internal standards or external frameworks) and
//! their per-system compliance mappings. A mapping starts `not_assessed`
//! and records who assessed it and when on every status change; moving it
//! back to `not_assessed` clears the assessment stamp.
//!
//! Mappings carry a `revision` for optimistic concurrency, bumped on every
//! successful update.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use acr_core::{
    ActorId, ComplianceStatus, MappingId, PolicyId, PolicyKind, Regulation, SystemId, Timestamp,
};

const MAX_POLICY_NAME_LEN: usize = 255;

/// Errors raised by policy operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The caller's expected revision does not match the stored revision.
    #[error("policy mapping {id} is at revision {actual}, caller expected {expected}")]
    RevisionConflict {
        /// The mapping.
        id: MappingId,
        /// Revision the caller read.
        expected: u64,
        /// Revision currently stored.
        actual: u64,
    },
}

/// A policy that systems can be mapped against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique id.
    pub id: PolicyId,
    /// Display name.
    pub name: String,
    /// Internal standard or external framework.
    pub kind: PolicyKind,
    /// Free-form description.
    pub description: String,
    /// Regulations this policy supports. Empty means every regulation.
    pub regulations: Vec<Regulation>,
    /// Who created it.
    pub created_by: ActorId,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Input for [`Policy::create`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPolicy {
    /// Display name.
    pub name: String,
    /// Internal or external.
    pub kind: PolicyKind,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Supported regulations; empty means all.
    #[serde(default)]
    pub regulations: Vec<Regulation>,
}

impl Policy {
    /// Validate and build a policy.
    pub fn create(input: NewPolicy, actor: ActorId) -> Result<Self, PolicyError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(PolicyError::Validation("policy name must not be empty".into()));
        }
        if name.chars().count() > MAX_POLICY_NAME_LEN {
            return Err(PolicyError::Validation(format!(
                "policy name exceeds {MAX_POLICY_NAME_LEN} characters"
            )));
        }
        let mut regulations = input.regulations;
        regulations.sort();
        regulations.dedup();

        Ok(Self {
            id: PolicyId::new(),
            name: name.to_string(),
            kind: input.kind,
            description: input.description,
            regulations,
            created_by: actor,
            created_at: Timestamp::now(),
        })
    }

    /// Whether the policy is relevant under `regulation`.
    pub fn applies_to(&self, regulation: Regulation) -> bool {
        self.regulations.is_empty() || self.regulations.contains(&regulation)
    }
}

/// A system's compliance standing against one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMapping {
    /// Unique id.
    pub id: MappingId,
    /// The policy.
    pub policy_id: PolicyId,
    /// The system.
    pub system_id: SystemId,
    /// Current standing.
    pub compliance_status: ComplianceStatus,
    /// Assessor notes.
    pub notes: Option<String>,
    /// When the standing was last assessed.
    pub assessed_at: Option<Timestamp>,
    /// Who last assessed it.
    pub assessed_by: Option<ActorId>,
    /// Who created the mapping.
    pub created_by: ActorId,
    /// Optimistic concurrency revision.
    pub revision: u64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last change.
    pub updated_at: Timestamp,
}

impl PolicyMapping {
    /// A fresh `not_assessed` mapping.
    pub fn new(system_id: SystemId, policy_id: PolicyId, actor: ActorId) -> Self {
        let now = Timestamp::now();
        Self {
            id: MappingId::new(),
            policy_id,
            system_id,
            compliance_status: ComplianceStatus::NotAssessed,
            notes: None,
            assessed_at: None,
            assessed_by: None,
            created_by: actor,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a new compliance standing.
    pub fn update_status(
        &mut self,
        status: ComplianceStatus,
        notes: Option<String>,
        actor: &ActorId,
        expected_revision: Option<u64>,
    ) -> Result<(), PolicyError> {
        if let Some(expected) = expected_revision {
            if expected != self.revision {
                return Err(PolicyError::RevisionConflict {
                    id: self.id,
                    expected,
                    actual: self.revision,
                });
            }
        }
        let now = Timestamp::now();
        self.compliance_status = status;
        self.notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if status == ComplianceStatus::NotAssessed {
            self.assessed_at = None;
            self.assessed_by = None;
        } else {
            self.assessed_at = Some(now);
            self.assessed_by = Some(actor.clone());
        }
        self.revision += 1;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(name: &str) -> ActorId {
        ActorId::new(name).unwrap()
    }

    fn new_policy(regulations: Vec<Regulation>) -> NewPolicy {
        NewPolicy {
            name: "  Model Risk Standard ".to_string(),
            kind: PolicyKind::Internal,
            description: String::new(),
            regulations,
        }
    }

    #[test]
    fn create_trims_and_dedups() {
        let p = Policy::create(
            new_policy(vec![Regulation::Mas, Regulation::EuAiAct, Regulation::Mas]),
            actor("admin"),
        )
        .unwrap();
        assert_eq!(p.name, "Model Risk Standard");
        assert_eq!(p.regulations, vec![Regulation::EuAiAct, Regulation::Mas]);
        assert!(p.applies_to(Regulation::Mas));
        assert!(!p.applies_to(Regulation::UkAiAct));
    }

    #[test]
    fn empty_regulations_apply_everywhere() {
        let p = Policy::create(new_policy(vec![]), actor("admin")).unwrap();
        for reg in Regulation::ALL {
            assert!(p.applies_to(reg));
        }
    }

    #[test]
    fn blank_name_rejected() {
        let mut input = new_policy(vec![]);
        input.name = "   ".to_string();
        assert!(matches!(
            Policy::create(input, actor("admin")),
            Err(PolicyError::Validation(_))
        ));
    }

    #[test]
    fn status_update_stamps_and_clears_assessment() {
        let mut m = PolicyMapping::new(SystemId::new(), PolicyId::new(), actor("carol"));
        assert_eq!(m.compliance_status, ComplianceStatus::NotAssessed);

        m.update_status(
            ComplianceStatus::PartiallyCompliant,
            Some("logging gaps".into()),
            &actor("dave"),
            Some(1),
        )
        .unwrap();
        assert_eq!(m.revision, 2);
        assert_eq!(m.assessed_by, Some(actor("dave")));
        assert!(m.assessed_at.is_some());

        m.update_status(ComplianceStatus::NotAssessed, None, &actor("dave"), None)
            .unwrap();
        assert_eq!(m.assessed_by, None);
        assert_eq!(m.assessed_at, None);
        assert_eq!(m.notes, None);
        assert_eq!(m.revision, 3);
    }

    #[test]
    fn stale_revision_conflicts_without_change() {
        let mut m = PolicyMapping::new(SystemId::new(), PolicyId::new(), actor("carol"));
        let err = m
            .update_status(ComplianceStatus::Compliant, None, &actor("dave"), Some(7))
            .unwrap_err();
        assert_eq!(
            err,
            PolicyError::RevisionConflict {
                id: m.id,
                expected: 7,
                actual: 1
            }
        );
        assert_eq!(m.compliance_status, ComplianceStatus::NotAssessed);
        assert_eq!(m.revision, 1);
    }
}
