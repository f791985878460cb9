//! # acr-governance: Governance Tasks, Sign-off and Audit
//!
//! Turns the compliance records held in `acr-state` into an actionable,
//! per-regulation task list, decides whether a system may be signed off,
//! and keeps the audit trail of every mutation.
//!
//! Task lists are pure derivations: nothing here stores a task. The only
//! persisted governance fact is a [`CompletionAttestation`], merged into
//! the derived list by task id on every read.

pub mod audit;
pub mod completion;
pub mod error;
pub mod requirements;
pub mod signoff;
pub mod tasks;

pub use audit::{AuditEntry, AuditEntryType, AuditTrail};
pub use completion::{complete_task, CompletionAttestation, CompletionLedger};
pub use error::TaskError;
pub use requirements::{requirements_for, RegulationRequirements};
pub use signoff::{signoff_readiness, OutstandingTask, SignOffReadiness};
pub use tasks::{
    derive_all, derive_tasks, task_id, DerivationInput, GovernanceTask, RelatedEntityType,
    TaskKind, TaskStatus,
};
