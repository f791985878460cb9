//! # Governance Task Derivation
//!
//! Tasks are never stored. Every read derives the full list from the
//! current system, its assessments, documents and policy mappings, then
//! merges the completion side-table by task id.
//!
//! ## Task identity
//!
//! A task id is `"{regulation}:{subject}:{kind}"` where the subject is the
//! risk category, document type, assessment id, policy mapping id, or
//! `system`. The same inputs always produce the same ids in the same order.
//!
//! ## Status merge
//!
//! `blocked` wins over `completed`, which wins over `pending`. A completed
//! task never blocks sign-off.
//!
//! An attestation is bound to the `subject_state` of the task it completed:
//! the revision of the related assessment or mapping, or the document id
//! together with the system version, risk fingerprint and ruleset version
//! it was judged against. Once the subject moves on, the attestation no
//! longer applies and the task is open again.

use serde::{Deserialize, Serialize};

use acr_core::{
    ComplianceStatus, DocumentType, MitigationStatus, Regulation, RiskCategory, RiskLevel,
    RulesetCatalog,
};
use acr_state::{
    evaluate_staleness, risk_fingerprint, AiSystem, AssessmentStatus, ComplianceDocumentation,
    Policy, PolicyMapping, RiskAssessment,
};

use crate::completion::{CompletionAttestation, CompletionLedger};
use crate::error::TaskError;
use crate::requirements::requirements_for;

// ─── Task vocabulary ─────────────────────────────────────────────────

/// What a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// The system is prohibited and must be remediated.
    ResolveProhibition,
    /// No assessment exists for a required category.
    CompleteAssessment,
    /// A drafted assessment needs submitting.
    SubmitAssessment,
    /// A submitted assessment needs a reviewer.
    ReviewAssessment,
    /// A high-risk submitted assessment has no mitigation under way.
    TrackMitigation,
    /// A required document has never been generated.
    GenerateDocument,
    /// A required document is stale.
    RegenerateDocument,
    /// A mapped policy has not been assessed.
    AssessPolicy,
    /// A mapped policy is not fully complied with.
    RemediatePolicy,
}

impl TaskKind {
    /// Whether an attestation can complete the task.
    ///
    /// Submitting, reviewing, regenerating and lifting a prohibition are
    /// resolved only by the record transition itself.
    pub fn is_attestable(&self) -> bool {
        !matches!(
            self,
            Self::SubmitAssessment
                | Self::ReviewAssessment
                | Self::RegenerateDocument
                | Self::ResolveProhibition
        )
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolveProhibition => "resolve_prohibition",
            Self::CompleteAssessment => "complete_assessment",
            Self::SubmitAssessment => "submit_assessment",
            Self::ReviewAssessment => "review_assessment",
            Self::TrackMitigation => "track_mitigation",
            Self::GenerateDocument => "generate_document",
            Self::RegenerateDocument => "regenerate_document",
            Self::AssessPolicy => "assess_policy",
            Self::RemediatePolicy => "remediate_policy",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Open and actionable.
    Pending,
    /// Cannot be acted on until something else changes.
    Blocked,
    /// An attestation has been recorded.
    Completed,
}

impl TaskStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a task points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedEntityType {
    /// A risk assessment.
    RiskAssessment,
    /// A compliance document.
    Documentation,
    /// A policy mapping.
    Policy,
    /// Nothing specific.
    None,
}

/// One derived governance task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceTask {
    /// Stable identity, see the module docs.
    pub id: String,
    /// The regulation that requires it.
    pub regulation: Regulation,
    /// What it asks for.
    pub kind: TaskKind,
    /// Short title.
    pub title: String,
    /// Longer explanation.
    pub description: String,
    /// Derived status after merging completions.
    pub status: TaskStatus,
    /// Whether it must be resolved before sign-off.
    pub blocking: bool,
    /// Kind of record it points at.
    pub related_entity_type: RelatedEntityType,
    /// Id of that record, if any.
    pub related_entity_id: Option<String>,
    /// Token for the state of the task's subject; attestations are bound to it.
    pub subject_state: String,
    /// Completion attestation, when completed.
    pub completion: Option<CompletionAttestation>,
}

/// Everything the deriver reads. All slices may contain rows for other
/// systems; they are filtered here.
#[derive(Clone, Copy)]
pub struct DerivationInput<'a> {
    /// The system.
    pub system: &'a AiSystem,
    /// Assessments.
    pub assessments: &'a [RiskAssessment],
    /// Document versions.
    pub documents: &'a [ComplianceDocumentation],
    /// Policies.
    pub policies: &'a [Policy],
    /// Policy mappings.
    pub mappings: &'a [PolicyMapping],
    /// Ruleset versions in force.
    pub rulesets: &'a RulesetCatalog,
}

/// Task id for a `(regulation, subject, kind)` triple.
pub fn task_id(regulation: Regulation, subject: &str, kind: TaskKind) -> String {
    format!("{}:{}:{}", regulation.as_str(), subject, kind.as_str())
}

struct Draft {
    id: String,
    kind: TaskKind,
    title: String,
    description: String,
    blocked: bool,
    blocking: bool,
    related_entity_type: RelatedEntityType,
    related_entity_id: Option<String>,
    subject_state: String,
}

impl Draft {
    fn new(regulation: Regulation, subject: &str, kind: TaskKind) -> Self {
        Self {
            id: task_id(regulation, subject, kind),
            kind,
            title: String::new(),
            description: String::new(),
            blocked: false,
            blocking: false,
            related_entity_type: RelatedEntityType::None,
            related_entity_id: None,
            subject_state: String::new(),
        }
    }

    fn text(mut self, title: String, description: String) -> Self {
        self.title = title;
        self.description = description;
        self
    }

    fn related(mut self, kind: RelatedEntityType, id: String) -> Self {
        self.related_entity_type = kind;
        self.related_entity_id = Some(id);
        self
    }

    fn subject_state(mut self, state: String) -> Self {
        self.subject_state = state;
        self
    }

    fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    fn finish(
        self,
        regulation: Regulation,
        system: &AiSystem,
        ledger: &CompletionLedger,
    ) -> GovernanceTask {
        let completion = ledger
            .get(system.id, &self.id)
            .filter(|a| a.attested_state == self.subject_state)
            .cloned();
        let (status, blocking, completion) = if self.blocked {
            (TaskStatus::Blocked, self.blocking, None)
        } else if completion.is_some() {
            (TaskStatus::Completed, false, completion)
        } else {
            (TaskStatus::Pending, self.blocking, None)
        };
        GovernanceTask {
            id: self.id,
            regulation,
            kind: self.kind,
            title: self.title,
            description: self.description,
            status,
            blocking,
            related_entity_type: self.related_entity_type,
            related_entity_id: self.related_entity_id,
            subject_state: self.subject_state,
            completion,
        }
    }
}

// ─── Derivation ──────────────────────────────────────────────────────

/// Derive the tasks `regulation` imposes on the system.
///
/// Returns an empty list when the system is not subject to `regulation`.
pub fn derive_tasks(
    input: &DerivationInput<'_>,
    regulation: Regulation,
    ledger: &CompletionLedger,
) -> Result<Vec<GovernanceTask>, TaskError> {
    let system = input.system;
    if !system.jurisdictions.applies(regulation) {
        return Ok(Vec::new());
    }
    let requirements = requirements_for(regulation);
    let prohibited = system.is_prohibited();
    let in_scope: Vec<&RiskAssessment> = input
        .assessments
        .iter()
        .filter(|a| a.system_id == system.id && a.applies_to(regulation))
        .collect();

    let mut drafts = Vec::new();

    if prohibited {
        drafts.push(
            Draft::new(regulation, "system", TaskKind::ResolveProhibition)
                .text(
                    format!("Resolve prohibition of {}", system.name),
                    format!(
                        "{} is prohibited under {}. Record a remediation note and change its \
                         status before any further work.",
                        system.name,
                        regulation.display_name()
                    ),
                )
                .subject_state(format!("v{}", system.system_version))
                .blocked(true)
                .blocking(true),
        );
    }

    for &category in requirements.required_categories {
        if let Some(draft) = category_task(
            regulation,
            category,
            &in_scope,
            requirements.requires_review_before_documentation,
        ) {
            drafts.push(draft);
        }
    }

    let mut unmitigated: Vec<&RiskAssessment> = in_scope
        .iter()
        .copied()
        .filter(|a| {
            a.status == AssessmentStatus::Submitted
                && a.risk_level == RiskLevel::High
                && a.mitigation_status == MitigationStatus::NotStarted
        })
        .collect();
    unmitigated.sort_by_key(|a| a.id);
    for a in unmitigated {
        drafts.push(
            Draft::new(regulation, &a.id.to_string(), TaskKind::TrackMitigation)
                .text(
                    format!("Start mitigation for {} risk", a.category),
                    format!(
                        "High {} risk is under review with no mitigation started.",
                        a.category
                    ),
                )
                .related(RelatedEntityType::RiskAssessment, a.id.to_string())
                .subject_state(revision_state(&a.id.to_string(), a.revision)),
        );
    }

    for &document_type in requirements.required_documents {
        drafts.extend(document_task(input, regulation, document_type, prohibited)?);
    }

    drafts.extend(policy_tasks(input, regulation));

    Ok(drafts
        .into_iter()
        .map(|d| d.finish(regulation, system, ledger))
        .collect())
}

/// Derive tasks for every applicable regulation in priority order EU, UK, MAS.
pub fn derive_all(
    input: &DerivationInput<'_>,
    ledger: &CompletionLedger,
) -> Result<Vec<GovernanceTask>, TaskError> {
    let mut tasks = Vec::new();
    for regulation in input.system.jurisdictions.applicable() {
        tasks.extend(derive_tasks(input, regulation, ledger)?);
    }
    Ok(tasks)
}

fn category_task(
    regulation: Regulation,
    category: RiskCategory,
    in_scope: &[&RiskAssessment],
    review_required: bool,
) -> Option<Draft> {
    let of_category = || in_scope.iter().copied().filter(move |a| a.category == category);
    if of_category().any(|a| a.is_approved()) {
        return None;
    }
    let earliest = |status: AssessmentStatus| {
        of_category()
            .filter(|a| a.status == status)
            .min_by_key(|a| (a.created_at, a.id))
    };

    let draft = if let Some(a) = earliest(AssessmentStatus::Submitted) {
        Draft::new(regulation, category.as_str(), TaskKind::ReviewAssessment)
            .text(
                format!("Review {category} risk assessment"),
                format!(
                    "A {} risk {category} assessment awaits review by someone other than {}.",
                    a.risk_level, a.assessed_by
                ),
            )
            .related(RelatedEntityType::RiskAssessment, a.id.to_string())
            .subject_state(revision_state(&a.id.to_string(), a.revision))
            .blocking(a.risk_level == RiskLevel::High)
    } else if let Some(a) = earliest(AssessmentStatus::Draft) {
        Draft::new(regulation, category.as_str(), TaskKind::SubmitAssessment)
            .text(
                format!("Submit {category} risk assessment"),
                format!(
                    "The drafted {category} assessment must be submitted by {} for review.",
                    a.assessed_by
                ),
            )
            .related(RelatedEntityType::RiskAssessment, a.id.to_string())
            .subject_state(revision_state(&a.id.to_string(), a.revision))
            .blocking(a.risk_level == RiskLevel::High)
    } else {
        Draft::new(regulation, category.as_str(), TaskKind::CompleteAssessment)
            .text(
                format!("Complete {category} risk assessment"),
                format!(
                    "{} requires an approved {category} risk assessment.",
                    regulation.display_name()
                ),
            )
            .subject_state(category_state(of_category()))
            .blocking(review_required)
    };
    Some(draft)
}

fn document_task(
    input: &DerivationInput<'_>,
    regulation: Regulation,
    document_type: DocumentType,
    prohibited: bool,
) -> Result<Option<Draft>, TaskError> {
    let system = input.system;
    let latest = input
        .documents
        .iter()
        .filter(|d| d.is_for(system.id, regulation, document_type))
        .max_by_key(|d| d.version);

    let draft = match latest {
        None => Draft::new(regulation, document_type.as_str(), TaskKind::GenerateDocument)
            .text(
                format!("Generate {}", document_type.title()),
                format!(
                    "No {} has been generated for {}.",
                    document_type.title(),
                    regulation.display_name()
                ),
            )
            .subject_state(format!("v{}", system.system_version)),
        Some(doc) => {
            let report = evaluate_staleness(doc, system, input.assessments, input.rulesets)?;
            if !report.status.is_stale() {
                return Ok(None);
            }
            let fingerprint = risk_fingerprint(system.id, regulation, input.assessments)?;
            let state = format!(
                "{}@v{}:{}:{}",
                doc.id,
                system.system_version,
                fingerprint,
                input.rulesets.version_for(regulation)
            );
            Draft::new(regulation, document_type.as_str(), TaskKind::RegenerateDocument)
                .text(
                    format!("Regenerate {}", document_type.title()),
                    format!(
                        "Version {} is {} and must be regenerated.",
                        doc.version, report.status
                    ),
                )
                .related(RelatedEntityType::Documentation, doc.id.to_string())
                .subject_state(state)
                .blocking(true)
        }
    };
    Ok(Some(draft.blocked(prohibited)))
}

fn policy_tasks(input: &DerivationInput<'_>, regulation: Regulation) -> Vec<Draft> {
    let system = input.system;
    let mut relevant: Vec<(&Policy, &PolicyMapping)> = input
        .mappings
        .iter()
        .filter(|m| m.system_id == system.id)
        .filter_map(|m| {
            input
                .policies
                .iter()
                .find(|p| p.id == m.policy_id && p.applies_to(regulation))
                .map(|p| (p, m))
        })
        .collect();
    relevant.sort_by(|(pa, ma), (pb, mb)| pa.name.cmp(&pb.name).then(ma.id.cmp(&mb.id)));

    relevant
        .into_iter()
        .filter_map(|(policy, mapping)| {
            let subject = mapping.id.to_string();
            let draft = match mapping.compliance_status {
                ComplianceStatus::Compliant => return None,
                ComplianceStatus::NotAssessed => {
                    Draft::new(regulation, &subject, TaskKind::AssessPolicy).text(
                        format!("Assess compliance with {}", policy.name),
                        format!("{} has not been assessed against {}.", system.name, policy.name),
                    )
                }
                ComplianceStatus::PartiallyCompliant => {
                    Draft::new(regulation, &subject, TaskKind::RemediatePolicy).text(
                        format!("Close gaps against {}", policy.name),
                        format!("{} is partially compliant with {}.", system.name, policy.name),
                    )
                }
                ComplianceStatus::NonCompliant => {
                    Draft::new(regulation, &subject, TaskKind::RemediatePolicy)
                        .text(
                            format!("Remediate non-compliance with {}", policy.name),
                            format!("{} is non-compliant with {}.", system.name, policy.name),
                        )
                        .blocking(true)
                }
            };
            let state = revision_state(&subject, mapping.revision);
            Some(
                draft
                    .related(RelatedEntityType::Policy, subject)
                    .subject_state(state),
            )
        })
        .collect()
}

fn revision_state(id: &str, revision: u64) -> String {
    format!("{id}@r{revision}")
}

/// Revisions of every assessment already filed in the category, so a new
/// rejection reopens an attested `complete_assessment`.
fn category_state<'a>(assessments: impl Iterator<Item = &'a RiskAssessment>) -> String {
    let mut states: Vec<String> = assessments
        .map(|a| revision_state(&a.id.to_string(), a.revision))
        .collect();
    if states.is_empty() {
        return "none".to_string();
    }
    states.sort();
    states.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use acr_core::{ActorId, JurisdictionFlags, LifecycleStage, PolicyKind, SystemStatus};
    use acr_state::{
        generate, AssessmentDraft, GenerationReason, GenerationRequest, MarkdownGenerator,
        NewPolicy, NewSystem, OpenGate, SystemPatch, TransitionContext,
    };

    use crate::completion::complete_task;
    use crate::signoff::signoff_readiness;

    fn actor(name: &str) -> ActorId {
        ActorId::new(name).unwrap()
    }

    fn ctx(who: &ActorId) -> TransitionContext<'_> {
        TransitionContext {
            actor: who,
            gate: &OpenGate,
            lifecycle_stage: LifecycleStage::Development,
            expected_revision: None,
        }
    }

    fn system(eu: bool, uk: bool, mas: bool) -> AiSystem {
        AiSystem::register(
            NewSystem {
                name: "Fraud Detector".to_string(),
                jurisdictions: JurisdictionFlags { eu, uk, mas },
                ..Default::default()
            },
            actor("alice"),
        )
        .unwrap()
    }

    fn assessment(sys: &AiSystem, category: RiskCategory, level: RiskLevel) -> RiskAssessment {
        RiskAssessment::create(
            sys.id,
            AssessmentDraft {
                category,
                regulation: None,
                risk_level: level,
                mitigation_status: None,
                summary: "Assessment of model behaviour".to_string(),
                evidence_links: vec!["https://evidence.example.com/report".to_string()],
                evidence_text: None,
                supersedes: None,
            },
            &ctx(&actor("alice")),
        )
        .unwrap()
    }

    fn approved(sys: &AiSystem, category: RiskCategory) -> RiskAssessment {
        let mut a = assessment(sys, category, RiskLevel::Low);
        a.submit(&ctx(&actor("alice"))).unwrap();
        a.approve(&ctx(&actor("bob"))).unwrap();
        a
    }

    fn doc(
        sys: &AiSystem,
        regulation: Regulation,
        document_type: DocumentType,
        assessments: &[RiskAssessment],
        rulesets: &RulesetCatalog,
    ) -> ComplianceDocumentation {
        regenerated(sys, regulation, document_type, assessments, rulesets, 1)
    }

    fn regenerated(
        sys: &AiSystem,
        regulation: Regulation,
        document_type: DocumentType,
        assessments: &[RiskAssessment],
        rulesets: &RulesetCatalog,
        version: u32,
    ) -> ComplianceDocumentation {
        let reason = if version == 1 {
            GenerationReason::Generate
        } else {
            GenerationReason::Regenerate
        };
        generate(
            &GenerationRequest {
                system: sys,
                regulation,
                document_type,
                assessments,
                rulesets,
                version,
                actor: &actor("alice"),
                reason,
            },
            &MarkdownGenerator,
        )
        .unwrap()
    }

    fn touch(sys: &mut AiSystem, description: &str) {
        sys.apply_patch(
            &SystemPatch {
                description: Some(description.to_string()),
                ..Default::default()
            },
            &actor("alice"),
        )
        .unwrap();
    }

    struct Fixture {
        assessments: Vec<RiskAssessment>,
        documents: Vec<ComplianceDocumentation>,
        policies: Vec<Policy>,
        mappings: Vec<PolicyMapping>,
        rulesets: RulesetCatalog,
    }

    impl Fixture {
        fn empty() -> Self {
            Self {
                assessments: Vec::new(),
                documents: Vec::new(),
                policies: Vec::new(),
                mappings: Vec::new(),
                rulesets: RulesetCatalog::default(),
            }
        }

        fn input<'a>(&'a self, system: &'a AiSystem) -> DerivationInput<'a> {
            DerivationInput {
                system,
                assessments: &self.assessments,
                documents: &self.documents,
                policies: &self.policies,
                mappings: &self.mappings,
                rulesets: &self.rulesets,
            }
        }
    }

    fn derive_fresh(f: &Fixture, sys: &AiSystem, regulation: Regulation) -> Vec<GovernanceTask> {
        derive_tasks(&f.input(sys), regulation, &CompletionLedger::new()).unwrap()
    }

    fn find<'a>(tasks: &'a [GovernanceTask], id: &str) -> &'a GovernanceTask {
        tasks
            .iter()
            .find(|t| t.id == id)
            .unwrap_or_else(|| panic!("missing task {id}"))
    }

    #[test]
    fn non_applicable_regulation_yields_nothing() {
        let sys = system(false, true, false);
        let f = Fixture::empty();
        let tasks = derive_fresh(&f, &sys, Regulation::EuAiAct);
        assert!(tasks.is_empty());
    }

    #[test]
    fn fresh_eu_system_needs_assessments_and_documents() {
        let sys = system(true, false, false);
        let f = Fixture::empty();
        let tasks = derive_fresh(&f, &sys, Regulation::EuAiAct);

        let kinds: Vec<TaskKind> = tasks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TaskKind::CompleteAssessment,
                TaskKind::CompleteAssessment,
                TaskKind::CompleteAssessment,
                TaskKind::CompleteAssessment,
                TaskKind::GenerateDocument,
                TaskKind::GenerateDocument,
                TaskKind::GenerateDocument,
            ]
        );
        let bias = find(&tasks, "eu_ai_act:bias:complete_assessment");
        assert!(bias.blocking, "EU requires reviewed assessments");
        assert_eq!(bias.status, TaskStatus::Pending);
        let tech = find(&tasks, "eu_ai_act:technical_documentation:generate_document");
        assert!(!tech.blocking);
    }

    #[test]
    fn uk_missing_assessment_is_not_blocking() {
        let sys = system(false, true, false);
        let f = Fixture::empty();
        let tasks = derive_fresh(&f, &sys, Regulation::UkAiAct);
        assert!(!find(&tasks, "uk_ai_act:bias:complete_assessment").blocking);
        assert!(tasks.iter().all(|t| t.id != "uk_ai_act:privacy:complete_assessment"));
    }

    #[test]
    fn pending_assessments_produce_submit_and_review_tasks() {
        let sys = system(false, false, true);
        let mut f = Fixture::empty();
        let drafted = assessment(&sys, RiskCategory::Bias, RiskLevel::Medium);
        let mut submitted = assessment(&sys, RiskCategory::Robustness, RiskLevel::High);
        submitted.submit(&ctx(&actor("alice"))).unwrap();
        f.assessments = vec![
            drafted.clone(),
            submitted.clone(),
            approved(&sys, RiskCategory::Explainability),
        ];

        let tasks = derive_fresh(&f, &sys, Regulation::Mas);
        let submit = find(&tasks, "mas:bias:submit_assessment");
        assert!(!submit.blocking);
        assert_eq!(submit.related_entity_id, Some(drafted.id.to_string()));

        let review = find(&tasks, "mas:robustness:review_assessment");
        assert!(review.blocking, "high risk review blocks sign-off");
        assert_eq!(review.related_entity_type, RelatedEntityType::RiskAssessment);

        let mitigation = task_id(
            Regulation::Mas,
            &submitted.id.to_string(),
            TaskKind::TrackMitigation,
        );
        assert!(!find(&tasks, &mitigation).blocking);

        assert!(tasks.iter().all(|t| !t.id.starts_with("mas:explainability:")));
    }

    #[test]
    fn stale_document_requires_regeneration_task() {
        let mut sys = system(false, true, false);
        let mut f = Fixture::empty();
        let card = DocumentType::AiSystemCard;
        f.documents = vec![doc(&sys, Regulation::UkAiAct, card, &[], &f.rulesets)];

        let tasks = derive_fresh(&f, &sys, Regulation::UkAiAct);
        assert!(tasks.iter().all(|t| !t.id.starts_with("uk_ai_act:ai_system_card:")));

        sys.apply_patch(
            &SystemPatch {
                description: Some("retrained on 2026 data".to_string()),
                ..Default::default()
            },
            &actor("alice"),
        )
        .unwrap();
        let tasks = derive_fresh(&f, &sys, Regulation::UkAiAct);
        let regen = find(&tasks, "uk_ai_act:ai_system_card:regenerate_document");
        assert!(regen.blocking);
        assert_eq!(regen.status, TaskStatus::Pending);
        assert_eq!(regen.related_entity_id, Some(f.documents[0].id.to_string()));
    }

    #[test]
    fn prohibited_system_blocks_documentation() {
        let mut sys = system(true, false, false);
        sys.apply_patch(
            &SystemPatch {
                status: Some(SystemStatus::Prohibited),
                ..Default::default()
            },
            &actor("alice"),
        )
        .unwrap();
        let f = Fixture::empty();
        let tasks = derive_fresh(&f, &sys, Regulation::EuAiAct);

        let first = &tasks[0];
        assert_eq!(first.kind, TaskKind::ResolveProhibition);
        assert_eq!(first.status, TaskStatus::Blocked);
        assert!(first.blocking);
        assert!(tasks
            .iter()
            .filter(|t| t.kind == TaskKind::GenerateDocument)
            .all(|t| t.status == TaskStatus::Blocked));
    }

    #[test]
    fn policy_mappings_in_scope_produce_tasks() {
        let sys = system(true, false, true);
        let mut f = Fixture::empty();
        let mas_only = Policy::create(
            NewPolicy {
                name: "FEAT Fairness Checklist".to_string(),
                kind: PolicyKind::External,
                description: String::new(),
                regulations: vec![Regulation::Mas],
            },
            actor("admin"),
        )
        .unwrap();
        let everywhere = Policy::create(
            NewPolicy {
                name: "Acceptable Use".to_string(),
                kind: PolicyKind::Internal,
                description: String::new(),
                regulations: vec![],
            },
            actor("admin"),
        )
        .unwrap();
        let m1 = PolicyMapping::new(sys.id, mas_only.id, actor("carol"));
        let mut m2 = PolicyMapping::new(sys.id, everywhere.id, actor("carol"));
        m2.update_status(ComplianceStatus::NonCompliant, None, &actor("dave"), None)
            .unwrap();
        f.policies = vec![mas_only, everywhere];
        f.mappings = vec![m1.clone(), m2.clone()];

        let eu = derive_fresh(&f, &sys, Regulation::EuAiAct);
        let eu_policy: Vec<&GovernanceTask> = eu
            .iter()
            .filter(|t| t.related_entity_type == RelatedEntityType::Policy)
            .collect();
        assert_eq!(eu_policy.len(), 1);
        assert_eq!(eu_policy[0].kind, TaskKind::RemediatePolicy);
        assert!(eu_policy[0].blocking);

        let mas = derive_fresh(&f, &sys, Regulation::Mas);
        let assess_id = task_id(Regulation::Mas, &m1.id.to_string(), TaskKind::AssessPolicy);
        let assess = find(&mas, &assess_id);
        assert!(!assess.blocking);
    }

    #[test]
    fn completion_merges_by_id_and_clears_blocking() {
        let sys = system(true, false, false);
        let f = Fixture::empty();
        let mut ledger = CompletionLedger::new();
        let tasks = derive_tasks(&f.input(&sys), Regulation::EuAiAct, &ledger).unwrap();
        let id = "eu_ai_act:privacy:complete_assessment";
        let att = complete_task(&tasks, sys.id, id, &actor("carol"), None).unwrap();
        ledger.record(att);

        let tasks = derive_tasks(&f.input(&sys), Regulation::EuAiAct, &ledger).unwrap();
        let done = find(&tasks, id);
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(!done.blocking);
        assert_eq!(done.completion.as_ref().map(|c| c.completed_by.as_str()), Some("carol"));
        assert_eq!(find(&tasks, "eu_ai_act:bias:complete_assessment").status, TaskStatus::Pending);
    }

    #[test]
    fn derive_all_orders_eu_uk_mas() {
        let sys = system(true, true, true);
        let f = Fixture::empty();
        let tasks = derive_all(&f.input(&sys), &CompletionLedger::new()).unwrap();
        let regs: Vec<Regulation> = tasks.iter().map(|t| t.regulation).collect();
        let mut sorted = regs.clone();
        sorted.sort();
        assert_eq!(regs, sorted);
        assert!(regs.contains(&Regulation::EuAiAct));
        assert!(regs.contains(&Regulation::UkAiAct));
        assert!(regs.contains(&Regulation::Mas));
    }

    #[test]
    fn fully_covered_system_is_ready_for_signoff() {
        let sys = system(false, true, false);
        let mut f = Fixture::empty();
        f.assessments = RiskCategory::ALL.iter().map(|c| approved(&sys, *c)).collect();
        f.documents = [DocumentType::AiSystemCard, DocumentType::TransparencyNotice]
            .into_iter()
            .map(|t| doc(&sys, Regulation::UkAiAct, t, &f.assessments, &f.rulesets))
            .collect();
        let tasks = derive_all(&f.input(&sys), &CompletionLedger::new()).unwrap();
        assert!(tasks.is_empty(), "unexpected tasks: {tasks:?}");
        assert!(signoff_readiness(&tasks).ready);
    }

    #[test]
    fn derivation_is_deterministic() {
        let sys = system(true, true, true);
        let mut f = Fixture::empty();
        f.assessments = vec![
            assessment(&sys, RiskCategory::Bias, RiskLevel::High),
            approved(&sys, RiskCategory::Privacy),
        ];
        let a = derive_all(&f.input(&sys), &CompletionLedger::new()).unwrap();
        let b = derive_all(&f.input(&sys), &CompletionLedger::new()).unwrap();
        assert_eq!(a, b);
        let mut ids: Vec<&str> = a.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), a.len(), "task ids must be unique");
    }

    #[test]
    fn attestation_lapses_when_the_document_goes_stale_again() {
        let mut sys = system(false, true, false);
        let mut f = Fixture::empty();
        let card = DocumentType::AiSystemCard;
        let id = "uk_ai_act:ai_system_card:regenerate_document";
        f.documents = vec![doc(&sys, Regulation::UkAiAct, card, &[], &f.rulesets)];
        touch(&mut sys, "retrained on 2026 data");

        let tasks = derive_fresh(&f, &sys, Regulation::UkAiAct);
        let regen = find(&tasks, id);
        let err = complete_task(&tasks, sys.id, id, &actor("carol"), None).unwrap_err();
        assert!(matches!(err, TaskError::InvalidState { .. }));

        // An attestation recorded against the v1 staleness, e.g. hydrated
        // from an older ledger.
        let mut ledger = CompletionLedger::new();
        ledger.record(CompletionAttestation {
            task_id: id.to_string(),
            system_id: sys.id,
            completed_by: actor("carol"),
            completed_at: acr_core::Timestamp::now(),
            evidence_link: None,
            attested_state: regen.subject_state.clone(),
        });

        f.documents.push(regenerated(&sys, Regulation::UkAiAct, card, &[], &f.rulesets, 2));
        let tasks = derive_tasks(&f.input(&sys), Regulation::UkAiAct, &ledger).unwrap();
        assert!(tasks.iter().all(|t| t.id != id), "v2 is current");

        touch(&mut sys, "threshold recalibrated");
        let tasks = derive_tasks(&f.input(&sys), Regulation::UkAiAct, &ledger).unwrap();
        let regen = find(&tasks, id);
        assert_eq!(regen.status, TaskStatus::Pending);
        assert!(regen.blocking);
        assert!(regen.completion.is_none());
        assert!(!signoff_readiness(&tasks).ready);
    }

    #[test]
    fn review_task_cannot_be_attested_away() {
        let sys = system(false, false, true);
        let mut f = Fixture::empty();
        let mut submitted = assessment(&sys, RiskCategory::Bias, RiskLevel::High);
        submitted.submit(&ctx(&actor("alice"))).unwrap();
        f.assessments = vec![submitted];

        let tasks = derive_fresh(&f, &sys, Regulation::Mas);
        for who in ["alice", "bob"] {
            let err = complete_task(&tasks, sys.id, "mas:bias:review_assessment", &actor(who), None)
                .unwrap_err();
            assert!(matches!(err, TaskError::InvalidState { .. }));
        }
        assert!(!signoff_readiness(&tasks).ready);
    }

    #[test]
    fn policy_attestation_lapses_on_status_change() {
        let sys = system(false, true, false);
        let mut f = Fixture::empty();
        let policy = Policy::create(
            NewPolicy {
                name: "Model Change Control".to_string(),
                kind: PolicyKind::Internal,
                description: String::new(),
                regulations: vec![],
            },
            actor("admin"),
        )
        .unwrap();
        let mut mapping = PolicyMapping::new(sys.id, policy.id, actor("carol"));
        mapping
            .update_status(ComplianceStatus::PartiallyCompliant, None, &actor("dave"), None)
            .unwrap();
        f.policies = vec![policy];
        f.mappings = vec![mapping.clone()];
        let id = task_id(Regulation::UkAiAct, &mapping.id.to_string(), TaskKind::RemediatePolicy);

        let mut ledger = CompletionLedger::new();
        let tasks = derive_tasks(&f.input(&sys), Regulation::UkAiAct, &ledger).unwrap();
        ledger.record(complete_task(&tasks, sys.id, &id, &actor("carol"), None).unwrap());
        let tasks = derive_tasks(&f.input(&sys), Regulation::UkAiAct, &ledger).unwrap();
        assert_eq!(find(&tasks, &id).status, TaskStatus::Completed);

        f.mappings[0]
            .update_status(ComplianceStatus::NonCompliant, None, &actor("dave"), None)
            .unwrap();
        let tasks = derive_tasks(&f.input(&sys), Regulation::UkAiAct, &ledger).unwrap();
        let reopened = find(&tasks, &id);
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.blocking);
    }

    #[test]
    fn rejection_reopens_an_attested_assessment_task() {
        let sys = system(true, false, false);
        let mut f = Fixture::empty();
        let id = "eu_ai_act:bias:complete_assessment";
        let mut ledger = CompletionLedger::new();
        let tasks = derive_tasks(&f.input(&sys), Regulation::EuAiAct, &ledger).unwrap();
        ledger.record(complete_task(&tasks, sys.id, id, &actor("carol"), None).unwrap());

        let mut rejected = assessment(&sys, RiskCategory::Bias, RiskLevel::Medium);
        rejected.submit(&ctx(&actor("alice"))).unwrap();
        rejected
            .reject(&ctx(&actor("bob")), "evidence predates the retraining")
            .unwrap();
        f.assessments = vec![rejected];

        let tasks = derive_tasks(&f.input(&sys), Regulation::EuAiAct, &ledger).unwrap();
        let task = find(&tasks, id);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.blocking);
    }
}
