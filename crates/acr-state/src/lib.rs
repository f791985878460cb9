//! # acr-state: Compliance Record State Machines
//!
//! The mutable records of the compliance core and the rules that govern how
//! they change. Every operation here is synchronous and in-memory; the API
//! crate owns locking, persistence and authorization.
//!
//! ## Modules
//!
//! - **System** (`system.rs`): AI system registry records with a monotonic
//!   `system_version`, guarded writes on prohibited systems and sign-off
//!   activation.
//!
//! - **Assessment** (`assessment.rs`): risk assessment lifecycle
//!   (`Draft → Submitted → Approved | Rejected`) with four-eyes approval
//!   and optimistic revisions.
//!
//! - **Gate** (`gate.rs`): the lifecycle gate consulted before every
//!   assessment transition.
//!
//! - **Documentation** (`documentation.rs`), **Content** (`content.rs`) and
//!   **Staleness** (`staleness.rs`): append-only document versions, their
//!   provenance stamps, and the derived `current | outdated |
//!   requires_regeneration` status.
//!
//! - **Policy** (`policy.rs`): policies and per-system compliance mappings.

pub mod assessment;
pub mod content;
pub mod documentation;
pub mod gate;
pub mod policy;
pub mod staleness;
pub mod system;

// ─── System re-exports ──────────────────────────────────────────────

pub use system::{AiSystem, NewSystem, RemediationNote, StatusChange, SystemError, SystemPatch};

// ─── Assessment re-exports ──────────────────────────────────────────

pub use assessment::{
    aggregate_risk, AssessmentDraft, AssessmentError, AssessmentStatus,
    AssessmentTransitionRecord, RiskAssessment, TransitionContext,
};

// ─── Gate re-exports ────────────────────────────────────────────────

pub use gate::{GateAction, GateDecision, GateRequest, LifecycleGate, LifecycleStageGate, OpenGate};

// ─── Documentation re-exports ───────────────────────────────────────

pub use content::{ContentError, ContentGenerator, MarkdownGenerator, RenderInput};
pub use documentation::{
    generate, next_version, ComplianceDocumentation, DocumentationError, ForbiddenReason,
    GenerationMetadata, GenerationReason, GenerationRequest,
};
pub use staleness::{
    approved_in_scope, evaluate_staleness, risk_fingerprint, DocumentStatus, StalenessReason,
    StalenessReport,
};

// ─── Policy re-exports ──────────────────────────────────────────────

pub use policy::{NewPolicy, Policy, PolicyError, PolicyMapping};
