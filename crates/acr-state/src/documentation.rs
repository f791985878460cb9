//! # Documentation Versioning
//!
//! Compliance documents are append-only. Each generation produces a new
//! [`ComplianceDocumentation`] row for a `(system, regulation,
//! document_type)` tuple, stamped with the inputs it was built from:
//!
//! - `ai_system_version`: the system version at generation time;
//! - `risk_assessment_version`: the risk fingerprint
//!   ([`crate::staleness::risk_fingerprint`]);
//! - `regulation_version`: the ruleset tag in force.
//!
//! Those stamps are what [`crate::staleness::evaluate_staleness`] compares
//! against on every read. Version allocation is the caller's job (the store
//! computes [`next_version`] and inserts under one write lock).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use acr_core::{
    sha256_hex, ActorId, AssessmentId, CanonicalBytes, CanonicalizationError, DocumentId,
    DocumentType, Regulation, RulesetCatalog, SystemId, Timestamp,
};

use crate::assessment::RiskAssessment;
use crate::content::{ContentError, ContentGenerator, RenderInput};
use crate::staleness::{approved_in_scope, risk_fingerprint};
use crate::system::AiSystem;

/// Machine-readable reason a generation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForbiddenReason {
    /// The system is prohibited; no documentation may be produced.
    ProhibitedSystem,
}

impl ForbiddenReason {
    /// Wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProhibitedSystem => "PROHIBITED_SYSTEM",
        }
    }
}

impl std::fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised while generating a document version.
#[derive(Error, Debug)]
pub enum DocumentationError {
    /// Generation is not permitted for this system.
    #[error("documentation for system {system_id} is forbidden: {reason}")]
    Forbidden {
        /// Reason code.
        reason: ForbiddenReason,
        /// The system.
        system_id: SystemId,
    },

    /// Fingerprint or digest computation failed.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// The content generator failed.
    #[error(transparent)]
    Render(#[from] ContentError),
}

/// Whether a version was produced by a first generation or a regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationReason {
    /// Produced through the generate operation.
    Generate,
    /// Produced through the regenerate operation.
    Regenerate,
}

impl GenerationReason {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Regenerate => "regenerate",
        }
    }
}

impl std::fmt::Display for GenerationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance recorded alongside each version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Approved assessments the document was built from, sorted.
    pub approved_assessment_ids: Vec<AssessmentId>,
    /// Number of approved assessments in scope.
    pub approved_assessment_count: usize,
    /// Content digest of the system at generation time.
    pub system_digest: String,
    /// When the version was generated.
    pub generated_at: Timestamp,
    /// Who triggered generation.
    pub generated_by: ActorId,
    /// Generate or regenerate.
    pub reason: GenerationReason,
    /// The version this one follows, if any.
    pub supersedes_version: Option<u32>,
}

/// One immutable version of a compliance document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceDocumentation {
    /// Unique id of this version.
    pub id: DocumentId,
    /// Owning system.
    pub system_id: SystemId,
    /// Target regulation.
    pub regulation: Regulation,
    /// Document type.
    pub document_type: DocumentType,
    /// 1-based version within the tuple.
    pub version: u32,
    /// System version stamped at generation.
    pub ai_system_version: u64,
    /// Risk fingerprint stamped at generation.
    pub risk_assessment_version: String,
    /// Ruleset version stamped at generation.
    pub regulation_version: String,
    /// Provenance.
    pub generation_metadata: GenerationMetadata,
    /// Rendered content, stored verbatim.
    pub content: String,
    /// SHA-256 of the canonical content string.
    pub content_digest: String,
    /// Creation time.
    pub created_at: Timestamp,
}

impl ComplianceDocumentation {
    /// Whether this row belongs to the given tuple.
    pub fn is_for(
        &self,
        system_id: SystemId,
        regulation: Regulation,
        document_type: DocumentType,
    ) -> bool {
        self.system_id == system_id
            && self.regulation == regulation
            && self.document_type == document_type
    }
}

/// Inputs for one generation.
pub struct GenerationRequest<'a> {
    /// The system at its current version.
    pub system: &'a AiSystem,
    /// Target regulation.
    pub regulation: Regulation,
    /// Target document type.
    pub document_type: DocumentType,
    /// All assessments of the system; filtered to approved and in scope here.
    pub assessments: &'a [RiskAssessment],
    /// Ruleset versions in force.
    pub rulesets: &'a RulesetCatalog,
    /// Version number allocated by the store.
    pub version: u32,
    /// Who triggered generation.
    pub actor: &'a ActorId,
    /// Generate or regenerate.
    pub reason: GenerationReason,
}

/// Next version number for a tuple given the rows already stored.
pub fn next_version<'a>(
    existing: impl IntoIterator<Item = &'a ComplianceDocumentation>,
    system_id: SystemId,
    regulation: Regulation,
    document_type: DocumentType,
) -> u32 {
    existing
        .into_iter()
        .filter(|d| d.is_for(system_id, regulation, document_type))
        .map(|d| d.version)
        .max()
        .unwrap_or(0)
        + 1
}

/// Build a new document version.
///
/// Refused with [`ForbiddenReason::ProhibitedSystem`] when the system is
/// prohibited. Otherwise the row is stamped with the current system version,
/// the risk fingerprint and the ruleset version, and the generator's output
/// is stored as-is.
pub fn generate(
    request: &GenerationRequest<'_>,
    generator: &dyn ContentGenerator,
) -> Result<ComplianceDocumentation, DocumentationError> {
    let system = request.system;
    if system.is_prohibited() {
        return Err(DocumentationError::Forbidden {
            reason: ForbiddenReason::ProhibitedSystem,
            system_id: system.id,
        });
    }

    let approved = approved_in_scope(system.id, request.regulation, request.assessments);
    let fingerprint = risk_fingerprint(system.id, request.regulation, request.assessments)?;
    let ruleset_version = request.rulesets.version_for(request.regulation);
    let now = Timestamp::now();

    let content = generator.render(&RenderInput {
        system,
        regulation: request.regulation,
        document_type: request.document_type,
        version: request.version,
        approved: &approved,
        ruleset_version,
        fingerprint: &fingerprint,
        generated_at: now,
    })?;
    let content_digest = sha256_hex(&CanonicalBytes::new(&content)?);

    let approved_assessment_ids: Vec<AssessmentId> = approved.iter().map(|a| a.id).collect();
    let metadata = GenerationMetadata {
        approved_assessment_count: approved_assessment_ids.len(),
        approved_assessment_ids,
        system_digest: system.content_digest()?,
        generated_at: now,
        generated_by: request.actor.clone(),
        reason: request.reason,
        supersedes_version: request.version.checked_sub(1).filter(|v| *v > 0),
    };

    Ok(ComplianceDocumentation {
        id: DocumentId::new(),
        system_id: system.id,
        regulation: request.regulation,
        document_type: request.document_type,
        version: request.version,
        ai_system_version: system.system_version,
        risk_assessment_version: fingerprint,
        regulation_version: ruleset_version.to_string(),
        generation_metadata: metadata,
        content,
        content_digest,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MarkdownGenerator;
    use crate::system::{NewSystem, SystemPatch};
    use acr_core::{JurisdictionFlags, SystemStatus};

    struct FailingGenerator;

    impl ContentGenerator for FailingGenerator {
        fn render(&self, _input: &RenderInput<'_>) -> Result<String, ContentError> {
            Err(ContentError("template missing".to_string()))
        }
    }

    fn actor(name: &str) -> ActorId {
        ActorId::new(name).unwrap()
    }

    fn system() -> AiSystem {
        AiSystem::register(
            NewSystem {
                name: "Credit Scorer".to_string(),
                description: "Scores retail credit applications".to_string(),
                jurisdictions: JurisdictionFlags {
                    eu: true,
                    uk: false,
                    mas: true,
                },
                ..Default::default()
            },
            actor("alice"),
        )
        .unwrap()
    }

    fn request<'a>(
        system: &'a AiSystem,
        rulesets: &'a RulesetCatalog,
        who: &'a ActorId,
        version: u32,
    ) -> GenerationRequest<'a> {
        GenerationRequest {
            system,
            regulation: Regulation::Mas,
            document_type: DocumentType::ComplianceSummary,
            assessments: &[],
            rulesets,
            version,
            actor: who,
            reason: GenerationReason::Generate,
        }
    }

    #[test]
    fn generation_stamps_provenance() {
        let sys = system();
        let rulesets = RulesetCatalog::default();
        let alice = actor("alice");
        let doc = generate(&request(&sys, &rulesets, &alice, 1), &MarkdownGenerator).unwrap();

        assert_eq!(doc.version, 1);
        assert_eq!(doc.ai_system_version, 1);
        assert_eq!(doc.regulation_version, "2018-feat");
        assert_eq!(
            doc.risk_assessment_version,
            risk_fingerprint(sys.id, Regulation::Mas, &[]).unwrap()
        );
        assert_eq!(doc.generation_metadata.approved_assessment_count, 0);
        assert_eq!(doc.generation_metadata.supersedes_version, None);
        assert_eq!(doc.generation_metadata.system_digest, sys.content_digest().unwrap());
        assert!(doc.content.contains("Credit Scorer"));
        assert_eq!(doc.content_digest.len(), 64);
    }

    #[test]
    fn later_versions_record_what_they_supersede() {
        let sys = system();
        let rulesets = RulesetCatalog::default();
        let alice = actor("alice");
        let mut req = request(&sys, &rulesets, &alice, 3);
        req.reason = GenerationReason::Regenerate;
        let doc = generate(&req, &MarkdownGenerator).unwrap();
        assert_eq!(doc.generation_metadata.supersedes_version, Some(2));
        assert_eq!(doc.generation_metadata.reason, GenerationReason::Regenerate);
    }

    #[test]
    fn prohibited_system_is_forbidden() {
        let mut sys = system();
        sys.apply_patch(
            &SystemPatch {
                status: Some(SystemStatus::Prohibited),
                ..Default::default()
            },
            &actor("alice"),
        )
        .unwrap();
        let rulesets = RulesetCatalog::default();
        let alice = actor("alice");
        let err = generate(&request(&sys, &rulesets, &alice, 1), &MarkdownGenerator).unwrap_err();
        assert!(matches!(
            err,
            DocumentationError::Forbidden {
                reason: ForbiddenReason::ProhibitedSystem,
                ..
            }
        ));
    }

    #[test]
    fn generator_failure_is_reported() {
        let sys = system();
        let rulesets = RulesetCatalog::default();
        let alice = actor("alice");
        let err = generate(&request(&sys, &rulesets, &alice, 1), &FailingGenerator).unwrap_err();
        assert!(matches!(err, DocumentationError::Render(_)));
    }

    #[test]
    fn next_version_is_per_tuple() {
        let sys = system();
        let rulesets = RulesetCatalog::default();
        let alice = actor("alice");
        let first = generate(&request(&sys, &rulesets, &alice, 1), &MarkdownGenerator).unwrap();
        let second = generate(&request(&sys, &rulesets, &alice, 2), &MarkdownGenerator).unwrap();
        let docs = vec![first, second];

        assert_eq!(
            next_version(&docs, sys.id, Regulation::Mas, DocumentType::ComplianceSummary),
            3
        );
        assert_eq!(
            next_version(&docs, sys.id, Regulation::EuAiAct, DocumentType::ComplianceSummary),
            1
        );
        assert_eq!(
            next_version(&docs, SystemId::new(), Regulation::Mas, DocumentType::ComplianceSummary),
            1
        );
    }

    #[test]
    fn consecutive_generations_are_distinct_rows() {
        let sys = system();
        let rulesets = RulesetCatalog::default();
        let alice = actor("alice");
        let first = generate(&request(&sys, &rulesets, &alice, 1), &MarkdownGenerator).unwrap();
        let second = generate(&request(&sys, &rulesets, &alice, 2), &MarkdownGenerator).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.risk_assessment_version, second.risk_assessment_version);
    }
}
