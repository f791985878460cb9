#![deny(missing_docs)]

//! # acr-core: Foundational Types for AI Compliance Records
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass an
//!    [`AssessmentId`] where a [`SystemId`] is expected, and an [`ActorId`]
//!    is validated once at the boundary.
//!
//! 2. **[`CanonicalBytes`] is the sole path to digest computation.** Risk
//!    fingerprints, system content digests and audit entry digests all flow
//!    through `CanonicalBytes::new()` (RFC 8785 JCS with float rejection).
//!
//! 3. **Closed enums.** Risk categories, document types, regulations and
//!    statuses are exhaustive enums; unknown values are rejected when
//!    deserialized.
//!
//! 4. **Ruleset versions are explicit.** [`RulesetCatalog`] is passed to
//!    every staleness computation instead of being read from ambient state.

pub mod canonical;
pub mod digest;
pub mod domain;
pub mod error;
pub mod identity;
pub mod regulation;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use domain::{
    ComplianceStatus, DataUsage, DocumentType, LifecycleStage, MitigationStatus, PolicyKind,
    RiskCategory, RiskLevel, SystemStatus,
};
pub use error::{CanonicalizationError, RulesetError, ValidationError};
pub use identity::{
    validate_evidence_uri, ActorId, AssessmentId, DocumentId, MappingId, PolicyId, SystemId,
};
pub use regulation::{JurisdictionFlags, Regulation, RulesetCatalog};
pub use temporal::Timestamp;
