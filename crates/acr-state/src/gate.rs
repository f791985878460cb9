//! # Lifecycle Gate
//!
//! An external collaborator that may veto assessment transitions based on
//! the system's lifecycle stage. Every transition in
//! [`crate::assessment`] consults the gate before any other check, and a
//! veto is surfaced with the gate's reason verbatim.
//!
//! [`LifecycleStageGate`] is the default rule table: a retired system
//! permits no assessment activity; every other stage permits everything.
//! Deployments inject their own implementation through `Arc<dyn LifecycleGate>`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use acr_core::{LifecycleStage, SystemId};

use crate::assessment::AssessmentStatus;

/// The assessment action being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    /// Create a new assessment.
    CreateAssessment,
    /// Submit a draft for review.
    SubmitAssessment,
    /// Approve a submitted assessment.
    ApproveAssessment,
    /// Reject a submitted assessment.
    RejectAssessment,
    /// Change mitigation status.
    UpdateMitigation,
}

impl GateAction {
    /// All actions.
    pub const ALL: [GateAction; 5] = [
        Self::CreateAssessment,
        Self::SubmitAssessment,
        Self::ApproveAssessment,
        Self::RejectAssessment,
        Self::UpdateMitigation,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAssessment => "create_assessment",
            Self::SubmitAssessment => "submit_assessment",
            Self::ApproveAssessment => "approve_assessment",
            Self::RejectAssessment => "reject_assessment",
            Self::UpdateMitigation => "update_mitigation",
        }
    }
}

impl std::fmt::Display for GateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the gate is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequest {
    /// The system the assessment belongs to.
    pub system_id: SystemId,
    /// The system's current lifecycle stage.
    pub lifecycle_stage: LifecycleStage,
    /// The action being attempted.
    pub action: GateAction,
    /// The assessment's current status; `None` on creation.
    pub current_status: Option<AssessmentStatus>,
}

/// The gate's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Reason for a veto, passed to the caller unchanged.
    pub reason: Option<String>,
}

impl GateDecision {
    /// Permit the action.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Veto the action.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Lifecycle/governance gate consulted before every assessment transition.
pub trait LifecycleGate: Send + Sync {
    /// Decide whether the requested action may proceed.
    fn check_allowed(&self, request: &GateRequest) -> GateDecision;
}

/// A gate that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl LifecycleGate for OpenGate {
    fn check_allowed(&self, _request: &GateRequest) -> GateDecision {
        GateDecision::allow()
    }
}

/// Rule table keyed by lifecycle stage listing the actions that stage forbids.
#[derive(Debug, Clone)]
pub struct LifecycleStageGate {
    denied: BTreeMap<LifecycleStage, BTreeSet<GateAction>>,
}

impl LifecycleStageGate {
    /// A gate with no rules.
    pub fn empty() -> Self {
        Self {
            denied: BTreeMap::new(),
        }
    }

    /// Forbid `action` while a system is in `stage`.
    pub fn deny(mut self, stage: LifecycleStage, action: GateAction) -> Self {
        self.denied.entry(stage).or_default().insert(action);
        self
    }

    /// Forbid every action while a system is in `stage`.
    pub fn deny_all(self, stage: LifecycleStage) -> Self {
        GateAction::ALL
            .into_iter()
            .fold(self, |gate, action| gate.deny(stage, action))
    }
}

impl Default for LifecycleStageGate {
    fn default() -> Self {
        Self::empty().deny_all(LifecycleStage::Retired)
    }
}

impl LifecycleGate for LifecycleStageGate {
    fn check_allowed(&self, request: &GateRequest) -> GateDecision {
        let forbidden = self
            .denied
            .get(&request.lifecycle_stage)
            .is_some_and(|actions| actions.contains(&request.action));
        if forbidden {
            GateDecision::deny(format!(
                "{} is not permitted while system {} is in lifecycle stage {}",
                request.action, request.system_id, request.lifecycle_stage
            ))
        } else {
            GateDecision::allow()
        }
    }
}
