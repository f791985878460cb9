//! # Staleness Engine
//!
//! Decides whether a generated document still reflects the AI system and
//! the approved assessments it was generated from. Evaluation is pure and
//! runs on every read; the derived status is never stored.
//!
//! ## Rules
//!
//! | Condition | Status |
//! |-----------|--------|
//! | system became `prohibited` at a version after the stamped one | `requires_regeneration` |
//! | ruleset version for the regulation changed | `requires_regeneration` |
//! | `system_version` differs from the stamp | `outdated` |
//! | risk fingerprint differs from the stamp | `outdated` |
//! | none of the above | `current` |
//!
//! Precedence is `requires_regeneration > outdated > current`. Every
//! triggered condition is reported as a reason regardless of precedence.

use serde::{Deserialize, Serialize};

use acr_core::{
    sha256_hex, AssessmentId, CanonicalBytes, CanonicalizationError, Regulation,
    RulesetCatalog, SystemId, Timestamp,
};

use crate::assessment::RiskAssessment;
use crate::documentation::ComplianceDocumentation;
use crate::system::AiSystem;

/// Derived freshness of a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Inputs unchanged since generation.
    Current,
    /// System or approved assessments changed since generation.
    Outdated,
    /// The system became prohibited or the ruleset changed.
    RequiresRegeneration,
}

impl DocumentStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Outdated => "outdated",
            Self::RequiresRegeneration => "requires_regeneration",
        }
    }

    /// Whether the document needs a new version.
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Current)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One triggered staleness condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StalenessReason {
    /// The system became prohibited after generation.
    SystemProhibited {
        /// Version at which the prohibition was recorded.
        at_version: u64,
    },
    /// The regulation's ruleset version changed.
    RulesetChanged {
        /// Version stamped on the document.
        stamped: String,
        /// Version now in force.
        current: String,
    },
    /// The system was mutated after generation.
    SystemVersionChanged {
        /// Version stamped on the document.
        stamped: u64,
        /// Current version.
        current: u64,
    },
    /// The set of approved assessments in scope changed.
    RiskFingerprintChanged {
        /// Fingerprint stamped on the document.
        stamped: String,
        /// Fingerprint now.
        current: String,
    },
}

impl StalenessReason {
    fn severity(&self) -> DocumentStatus {
        match self {
            Self::SystemProhibited { .. } | Self::RulesetChanged { .. } => {
                DocumentStatus::RequiresRegeneration
            }
            Self::SystemVersionChanged { .. } | Self::RiskFingerprintChanged { .. } => {
                DocumentStatus::Outdated
            }
        }
    }
}

/// Result of evaluating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessReport {
    /// Highest-precedence status among the triggered reasons.
    pub status: DocumentStatus,
    /// Every triggered condition.
    pub reasons: Vec<StalenessReason>,
}

#[derive(Serialize)]
struct FingerprintEntry<'a> {
    id: &'a AssessmentId,
    reviewed_at: Option<&'a Timestamp>,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    system_id: &'a SystemId,
    regulation: Regulation,
    approved: Vec<FingerprintEntry<'a>>,
}

/// Approved assessments of `system_id` in scope for `regulation`, sorted by id.
pub fn approved_in_scope<'a>(
    system_id: SystemId,
    regulation: Regulation,
    assessments: &'a [RiskAssessment],
) -> Vec<&'a RiskAssessment> {
    let mut approved: Vec<&RiskAssessment> = assessments
        .iter()
        .filter(|a| a.system_id == system_id && a.is_approved() && a.applies_to(regulation))
        .collect();
    approved.sort_by_key(|a| a.id);
    approved
}

/// Risk fingerprint for (system, regulation).
///
/// SHA-256 over the canonical form of the sorted `(id, reviewed_at)` pairs
/// of approved assessments in scope. Independent of input order; the empty
/// set has a stable value.
pub fn risk_fingerprint(
    system_id: SystemId,
    regulation: Regulation,
    assessments: &[RiskAssessment],
) -> Result<String, CanonicalizationError> {
    let approved = approved_in_scope(system_id, regulation, assessments)
        .into_iter()
        .map(|a| FingerprintEntry {
            id: &a.id,
            reviewed_at: a.reviewed_at.as_ref(),
        })
        .collect();
    let input = FingerprintInput {
        system_id: &system_id,
        regulation,
        approved,
    };
    Ok(sha256_hex(&CanonicalBytes::new(&input)?))
}

/// Evaluate a document against the current system, assessments and rulesets.
pub fn evaluate_staleness(
    document: &ComplianceDocumentation,
    system: &AiSystem,
    assessments: &[RiskAssessment],
    rulesets: &RulesetCatalog,
) -> Result<StalenessReport, CanonicalizationError> {
    let mut reasons = Vec::new();

    if let Some(at_version) = system.prohibited_since(document.ai_system_version) {
        reasons.push(StalenessReason::SystemProhibited { at_version });
    }
    let ruleset = rulesets.version_for(document.regulation);
    if ruleset != document.regulation_version {
        reasons.push(StalenessReason::RulesetChanged {
            stamped: document.regulation_version.clone(),
            current: ruleset.to_string(),
        });
    }
    if system.system_version != document.ai_system_version {
        reasons.push(StalenessReason::SystemVersionChanged {
            stamped: document.ai_system_version,
            current: system.system_version,
        });
    }
    let fingerprint = risk_fingerprint(system.id, document.regulation, assessments)?;
    if fingerprint != document.risk_assessment_version {
        reasons.push(StalenessReason::RiskFingerprintChanged {
            stamped: document.risk_assessment_version.clone(),
            current: fingerprint,
        });
    }

    let status = reasons
        .iter()
        .map(StalenessReason::severity)
        .max()
        .unwrap_or(DocumentStatus::Current);
    Ok(StalenessReport { status, reasons })
}
