//! # Risk Assessment State Machine
//!
//! ## States
//!
//! ```text
//! Draft ──submit──▶ Submitted ──approve──▶ Approved (terminal)
//!                       │
//!                       └──reject───▶ Rejected (terminal)
//! ```
//!
//! Re-assessment creates a new row, optionally pointing at the row it
//! supersedes. Only `Approved` rows count toward risk rollups and document
//! fingerprints.
//!
//! ## Check order
//!
//! Every transition runs the same sequence:
//!
//! 1. the [`LifecycleGate`] (veto reason passed through unchanged);
//! 2. the optimistic revision check, when the caller supplied one;
//! 3. the state check ([`AssessmentError::InvalidTransition`]);
//! 4. the actor check ([`AssessmentError::PermissionDenied`]);
//! 5. input validation.
//!
//! All checks complete before any field changes, so a failed call leaves
//! the record untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use acr_core::{
    validate_evidence_uri, ActorId, AssessmentId, LifecycleStage, MitigationStatus, Regulation,
    RiskCategory, RiskLevel, SystemId, Timestamp,
};

use crate::gate::{GateAction, GateRequest, LifecycleGate};

const MIN_SUMMARY_LEN: usize = 10;

// ─── Assessment State ────────────────────────────────────────────────

/// The lifecycle state of a risk assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Being written by its author.
    Draft,
    /// Awaiting review.
    Submitted,
    /// Reviewed and accepted (terminal).
    Approved,
    /// Reviewed and refused (terminal).
    Rejected,
}

impl AssessmentStatus {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by assessment operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssessmentError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The transition is not defined from the current state.
    #[error("cannot {action} assessment {id} in state {from}")]
    InvalidTransition {
        /// The assessment.
        id: AssessmentId,
        /// Current state.
        from: AssessmentStatus,
        /// Attempted action.
        action: GateAction,
    },

    /// The actor may not perform this transition.
    #[error("{actor} may not {action} assessment {id}: {reason}")]
    PermissionDenied {
        /// The assessment.
        id: AssessmentId,
        /// The refused actor.
        actor: ActorId,
        /// Attempted action.
        action: GateAction,
        /// Why.
        reason: String,
    },

    /// The operation is not permitted in the assessment's current state.
    #[error("assessment {id} is {status}: {reason}")]
    InvalidState {
        /// The assessment.
        id: AssessmentId,
        /// Current state.
        status: AssessmentStatus,
        /// Why.
        reason: String,
    },

    /// The lifecycle gate vetoed the action.
    #[error("{reason}")]
    GateVeto {
        /// Attempted action.
        action: GateAction,
        /// The gate's reason, verbatim.
        reason: String,
    },

    /// The caller's expected revision does not match the stored revision.
    #[error("assessment {id} is at revision {actual}, caller expected {expected}")]
    RevisionConflict {
        /// The assessment.
        id: AssessmentId,
        /// Revision the caller read.
        expected: u64,
        /// Revision currently stored.
        actual: u64,
    },
}

// ─── Records ─────────────────────────────────────────────────────────

/// Record of one assessment state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentTransitionRecord {
    /// State before.
    pub from_state: AssessmentStatus,
    /// State after.
    pub to_state: AssessmentStatus,
    /// The action that caused it.
    pub action: GateAction,
    /// Who performed it.
    pub actor: ActorId,
    /// When.
    pub timestamp: Timestamp,
    /// Free-text note (review comment, mitigation change).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Input for creating an assessment.
#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentDraft {
    /// Risk dimension.
    pub category: RiskCategory,
    /// Regulation this assessment is scoped to; `None` applies to all.
    #[serde(default)]
    pub regulation: Option<Regulation>,
    /// Assessed level.
    pub risk_level: RiskLevel,
    /// Initial mitigation status; defaults to `not_started`.
    #[serde(default)]
    pub mitigation_status: Option<MitigationStatus>,
    /// Summary of findings (at least 10 characters after trimming).
    pub summary: String,
    /// Absolute URIs of supporting evidence.
    #[serde(default)]
    pub evidence_links: Vec<String>,
    /// Text extracted from evidence files. Opaque.
    #[serde(default)]
    pub evidence_text: Option<String>,
    /// Assessment this one re-assesses.
    #[serde(default)]
    pub supersedes: Option<AssessmentId>,
}

/// Per-call context shared by every transition.
pub struct TransitionContext<'a> {
    /// Authenticated actor.
    pub actor: &'a ActorId,
    /// Gate to consult.
    pub gate: &'a dyn LifecycleGate,
    /// Lifecycle stage of the owning system.
    pub lifecycle_stage: LifecycleStage,
    /// Optimistic concurrency check against `revision`.
    pub expected_revision: Option<u64>,
}

/// A risk assessment of one category for one AI system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Identifier.
    pub id: AssessmentId,
    /// Owning system.
    pub system_id: SystemId,
    /// Risk dimension.
    pub category: RiskCategory,
    /// Regulation scope; `None` applies to every regulation of the system.
    pub regulation: Option<Regulation>,
    /// Assessed level.
    pub risk_level: RiskLevel,
    /// Mitigation progress.
    pub mitigation_status: MitigationStatus,
    /// Lifecycle state.
    pub status: AssessmentStatus,
    /// Findings summary.
    pub summary: String,
    /// Evidence URIs.
    pub evidence_links: Vec<String>,
    /// Extracted evidence text.
    pub evidence_text: Option<String>,
    /// Author.
    pub assessed_by: ActorId,
    /// Reviewer, set on approve or reject.
    pub reviewed_by: Option<ActorId>,
    /// Review time.
    pub reviewed_at: Option<Timestamp>,
    /// Reviewer comment; always present on rejected rows.
    pub review_comment: Option<String>,
    /// Assessment this one re-assesses.
    pub supersedes: Option<AssessmentId>,
    /// Optimistic concurrency token, +1 per mutation.
    pub revision: u64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Ordered state changes.
    pub transitions: Vec<AssessmentTransitionRecord>,
}

fn consult_gate(
    gate: &dyn LifecycleGate,
    system_id: SystemId,
    lifecycle_stage: LifecycleStage,
    action: GateAction,
    current_status: Option<AssessmentStatus>,
) -> Result<(), AssessmentError> {
    let decision = gate.check_allowed(&GateRequest {
        system_id,
        lifecycle_stage,
        action,
        current_status,
    });
    if decision.allowed {
        Ok(())
    } else {
        Err(AssessmentError::GateVeto {
            action,
            reason: decision
                .reason
                .unwrap_or_else(|| format!("{action} vetoed by lifecycle gate")),
        })
    }
}

impl RiskAssessment {
    /// Create a draft assessment.
    pub fn create(
        system_id: SystemId,
        draft: AssessmentDraft,
        ctx: &TransitionContext<'_>,
    ) -> Result<Self, AssessmentError> {
        consult_gate(
            ctx.gate,
            system_id,
            ctx.lifecycle_stage,
            GateAction::CreateAssessment,
            None,
        )?;

        let summary = draft.summary.trim().to_string();
        if summary.chars().count() < MIN_SUMMARY_LEN {
            return Err(AssessmentError::Validation(format!(
                "summary must be at least {MIN_SUMMARY_LEN} characters"
            )));
        }
        let evidence_links = draft
            .evidence_links
            .iter()
            .map(|link| validate_evidence_uri(link))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AssessmentError::Validation(e.to_string()))?;
        if draft.risk_level == RiskLevel::High && evidence_links.is_empty() {
            return Err(AssessmentError::Validation(
                "high risk assessments require at least one evidence link".to_string(),
            ));
        }

        let now = Timestamp::now();
        Ok(Self {
            id: AssessmentId::new(),
            system_id,
            category: draft.category,
            regulation: draft.regulation,
            risk_level: draft.risk_level,
            mitigation_status: draft
                .mitigation_status
                .unwrap_or(MitigationStatus::NotStarted),
            status: AssessmentStatus::Draft,
            summary,
            evidence_links,
            evidence_text: draft.evidence_text,
            assessed_by: ctx.actor.clone(),
            reviewed_by: None,
            reviewed_at: None,
            review_comment: None,
            supersedes: draft.supersedes,
            revision: 1,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        })
    }

    /// Submit for review (DRAFT → SUBMITTED). Only the author may submit.
    pub fn submit(&mut self, ctx: &TransitionContext<'_>) -> Result<(), AssessmentError> {
        self.preflight(ctx, GateAction::SubmitAssessment)?;
        self.require_state(AssessmentStatus::Draft, GateAction::SubmitAssessment)?;
        if ctx.actor != &self.assessed_by {
            return Err(self.denied(
                ctx.actor,
                GateAction::SubmitAssessment,
                "only the author may submit",
            ));
        }
        self.do_transition(
            AssessmentStatus::Submitted,
            GateAction::SubmitAssessment,
            ctx.actor,
            None,
        );
        Ok(())
    }

    /// Approve (SUBMITTED → APPROVED). The approver must not be the author.
    pub fn approve(&mut self, ctx: &TransitionContext<'_>) -> Result<(), AssessmentError> {
        self.preflight(ctx, GateAction::ApproveAssessment)?;
        self.require_state(AssessmentStatus::Submitted, GateAction::ApproveAssessment)?;
        if ctx.actor == &self.assessed_by {
            return Err(self.denied(
                ctx.actor,
                GateAction::ApproveAssessment,
                "the author of an assessment cannot approve it",
            ));
        }
        let now = Timestamp::now();
        self.reviewed_by = Some(ctx.actor.clone());
        self.reviewed_at = Some(now);
        self.do_transition(
            AssessmentStatus::Approved,
            GateAction::ApproveAssessment,
            ctx.actor,
            None,
        );
        Ok(())
    }

    /// Reject (SUBMITTED → REJECTED). A non-blank comment is required.
    pub fn reject(
        &mut self,
        ctx: &TransitionContext<'_>,
        comment: &str,
    ) -> Result<(), AssessmentError> {
        self.preflight(ctx, GateAction::RejectAssessment)?;
        self.require_state(AssessmentStatus::Submitted, GateAction::RejectAssessment)?;
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(AssessmentError::Validation(
                "a rejection requires a non-empty review comment".to_string(),
            ));
        }
        self.reviewed_by = Some(ctx.actor.clone());
        self.reviewed_at = Some(Timestamp::now());
        self.review_comment = Some(comment.to_string());
        self.do_transition(
            AssessmentStatus::Rejected,
            GateAction::RejectAssessment,
            ctx.actor,
            Some(comment.to_string()),
        );
        Ok(())
    }

    /// Change the mitigation status. Only permitted while submitted.
    pub fn update_mitigation_status(
        &mut self,
        ctx: &TransitionContext<'_>,
        status: MitigationStatus,
    ) -> Result<(), AssessmentError> {
        self.preflight(ctx, GateAction::UpdateMitigation)?;
        if self.status != AssessmentStatus::Submitted {
            return Err(AssessmentError::InvalidState {
                id: self.id,
                status: self.status,
                reason: "mitigation status can only change while the assessment is submitted"
                    .to_string(),
            });
        }
        let note = format!("mitigation {} -> {}", self.mitigation_status, status);
        self.mitigation_status = status;
        self.do_transition(self.status, GateAction::UpdateMitigation, ctx.actor, Some(note));
        Ok(())
    }

    /// Whether this assessment counts toward rollups and fingerprints.
    pub fn is_approved(&self) -> bool {
        self.status == AssessmentStatus::Approved
    }

    /// Whether this assessment is in scope for `regulation`.
    pub fn applies_to(&self, regulation: Regulation) -> bool {
        self.regulation.map_or(true, |r| r == regulation)
    }

    fn preflight(
        &self,
        ctx: &TransitionContext<'_>,
        action: GateAction,
    ) -> Result<(), AssessmentError> {
        consult_gate(ctx.gate, self.system_id, ctx.lifecycle_stage, action, Some(self.status))?;
        if let Some(expected) = ctx.expected_revision {
            if expected != self.revision {
                return Err(AssessmentError::RevisionConflict {
                    id: self.id,
                    expected,
                    actual: self.revision,
                });
            }
        }
        Ok(())
    }

    fn require_state(
        &self,
        expected: AssessmentStatus,
        action: GateAction,
    ) -> Result<(), AssessmentError> {
        if self.status != expected {
            return Err(AssessmentError::InvalidTransition {
                id: self.id,
                from: self.status,
                action,
            });
        }
        Ok(())
    }

    fn denied(&self, actor: &ActorId, action: GateAction, reason: &str) -> AssessmentError {
        AssessmentError::PermissionDenied {
            id: self.id,
            actor: actor.clone(),
            action,
            reason: reason.to_string(),
        }
    }

    fn do_transition(
        &mut self,
        to: AssessmentStatus,
        action: GateAction,
        actor: &ActorId,
        note: Option<String>,
    ) {
        let now = Timestamp::now();
        self.transitions.push(AssessmentTransitionRecord {
            from_state: self.status,
            to_state: to,
            action,
            actor: actor.clone(),
            timestamp: now,
            note,
        });
        self.status = to;
        self.revision += 1;
        self.updated_at = now;
    }
}

/// Highest risk level among approved assessments, or `None` if none are approved.
pub fn aggregate_risk<'a>(
    assessments: impl IntoIterator<Item = &'a RiskAssessment>,
) -> Option<RiskLevel> {
    assessments
        .into_iter()
        .filter(|a| a.is_approved())
        .map(|a| a.risk_level)
        .max()
}

// ─── Tests ───────────────────────────────────────────────────────────
