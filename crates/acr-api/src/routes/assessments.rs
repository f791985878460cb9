//! # Risk Assessment API
//!
//! Creation and the four-eyes review workflow. Every transition consults
//! the lifecycle gate with the owning system's current stage and carries an
//! optional `expected_revision` for optimistic concurrency.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use acr_core::{
    AssessmentId, MitigationStatus, Regulation, RiskCategory, RiskLevel, SystemId,
};
use acr_governance::{AuditEntry, AuditEntryType};
use acr_state::{AssessmentDraft, AssessmentError, RiskAssessment, TransitionContext};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, PaginationParams};
use crate::orchestration::{
    assessments_of, audit, persisted, persisted_conditional, system_or_404,
};
use crate::state::AppState;

/// Request to create a draft assessment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssessmentRequest {
    /// `bias`, `robustness`, `privacy` or `explainability`.
    #[schema(value_type = String)]
    pub category: RiskCategory,
    /// Scope to one regulation; omitted applies to all of the system's regulations.
    #[schema(value_type = Option<String>)]
    pub regulation: Option<Regulation>,
    /// `low`, `medium` or `high`.
    #[schema(value_type = String)]
    pub risk_level: RiskLevel,
    #[schema(value_type = Option<String>)]
    pub mitigation_status: Option<MitigationStatus>,
    /// At least 10 characters.
    pub summary: String,
    /// Absolute URIs. High risk requires at least one.
    #[serde(default)]
    pub evidence_links: Vec<String>,
    pub evidence_text: Option<String>,
    /// Assessment this one re-assesses.
    pub supersedes: Option<Uuid>,
}

impl From<CreateAssessmentRequest> for AssessmentDraft {
    fn from(req: CreateAssessmentRequest) -> Self {
        AssessmentDraft {
            category: req.category,
            regulation: req.regulation,
            risk_level: req.risk_level,
            mitigation_status: req.mitigation_status,
            summary: req.summary,
            evidence_links: req.evidence_links,
            evidence_text: req.evidence_text,
            supersedes: req.supersedes.map(AssessmentId::from_uuid),
        }
    }
}

/// Body of submit and approve.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// Revision the caller last read.
    pub expected_revision: Option<u64>,
}

/// Body of reject.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    /// Review comment. Must not be blank.
    #[serde(default)]
    pub comment: String,
    pub expected_revision: Option<u64>,
}

/// Body of a mitigation status change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MitigationRequest {
    /// `not_started`, `in_progress` or `mitigated`.
    #[schema(value_type = String)]
    pub mitigation_status: MitigationStatus,
    pub expected_revision: Option<u64>,
}

/// Build the assessment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/systems/:id/assessments",
            get(list_assessments).post(create_assessment),
        )
        .route("/v1/assessments/:id", get(get_assessment))
        .route("/v1/assessments/:id/submit", post(submit_assessment))
        .route("/v1/assessments/:id/approve", post(approve_assessment))
        .route("/v1/assessments/:id/reject", post(reject_assessment))
        .route("/v1/assessments/:id/mitigation", post(update_mitigation))
}

fn gate_vetoed(
    state: &AppState,
    caller: &CallerIdentity,
    system_id: SystemId,
    err: &AssessmentError,
) {
    if let AssessmentError::GateVeto { action, reason } = err {
        tracing::warn!(system_id = %system_id, %action, %reason, "lifecycle gate vetoed action");
        audit(
            state,
            AuditEntry::new(AuditEntryType::GateVetoed, &caller.actor)
                .system(system_id)
                .metadata(serde_json::json!({ "action": action, "reason": reason })),
        );
    }
}

/// Run one transition under the assessment's write lock.
///
/// Returns the updated assessment and the revision it held before, for the
/// conditional write-through.
fn transition(
    state: &AppState,
    caller: &CallerIdentity,
    id: AssessmentId,
    expected_revision: Option<u64>,
    apply: impl FnOnce(&mut RiskAssessment, &TransitionContext<'_>) -> Result<(), AssessmentError>,
) -> Result<(RiskAssessment, u64), AppError> {
    let current = state
        .assessments
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("risk assessment {id} not found")))?;
    let system = system_or_404(state, current.system_id)?;

    let ctx = TransitionContext {
        actor: &caller.actor,
        gate: state.gate.as_ref(),
        lifecycle_stage: system.lifecycle_stage,
        expected_revision,
    };

    let outcome = state
        .assessments
        .try_update(&id, |assessment| {
            let previous = assessment.revision;
            apply(assessment, &ctx)?;
            Ok::<_, AssessmentError>((assessment.clone(), previous))
        })
        .ok_or_else(|| AppError::NotFound(format!("risk assessment {id} not found")))?;

    outcome.map_err(|err| {
        gate_vetoed(state, caller, system.id, &err);
        AppError::from(err)
    })
}

async fn commit(
    state: &AppState,
    caller: &CallerIdentity,
    assessment: &RiskAssessment,
    previous_revision: u64,
    entry_type: AuditEntryType,
    metadata: serde_json::Value,
) -> Result<(), AppError> {
    if let Some(pool) = &state.db_pool {
        persisted_conditional(
            crate::db::assessments::update(pool, assessment, previous_revision).await,
            "risk assessment",
            assessment.id,
        )?;
    }

    tracing::info!(
        assessment_id = %assessment.id,
        system_id = %assessment.system_id,
        status = %assessment.status,
        revision = assessment.revision,
        actor = %caller.actor,
        "risk assessment {}",
        entry_type
    );
    audit(
        state,
        AuditEntry::new(entry_type, &caller.actor)
            .system(assessment.system_id)
            .subject(assessment.id)
            .metadata(metadata),
    );
    Ok(())
}

/// POST /v1/systems/:id/assessments: Create a draft assessment.
#[utoipa::path(
    post,
    path = "/v1/systems/{id}/assessments",
    params(("id" = Uuid, Path, description = "System ID")),
    request_body = CreateAssessmentRequest,
    responses(
        (status = 201, description = "Draft created", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
        (status = 409, description = "Vetoed by the lifecycle gate", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn create_assessment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CreateAssessmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RiskAssessment>), AppError> {
    require_role(&caller, Role::Contributor)?;
    let req = extract_json(body)?;
    let system = system_or_404(&state, SystemId::from_uuid(id))?;

    let ctx = TransitionContext {
        actor: &caller.actor,
        gate: state.gate.as_ref(),
        lifecycle_stage: system.lifecycle_stage,
        expected_revision: None,
    };
    let assessment = RiskAssessment::create(system.id, req.into(), &ctx).map_err(|err| {
        gate_vetoed(&state, &caller, system.id, &err);
        AppError::from(err)
    })?;
    state.assessments.insert(assessment.id, assessment.clone());

    if let Some(pool) = &state.db_pool {
        persisted(
            crate::db::assessments::insert(pool, &assessment).await,
            "risk assessment",
            assessment.id,
        )?;
    }

    tracing::info!(
        assessment_id = %assessment.id,
        system_id = %system.id,
        category = %assessment.category,
        risk_level = %assessment.risk_level,
        "risk assessment created"
    );
    audit(
        &state,
        AuditEntry::new(AuditEntryType::AssessmentCreated, &caller.actor)
            .system(system.id)
            .subject(assessment.id)
            .metadata(serde_json::json!({
                "category": assessment.category,
                "risk_level": assessment.risk_level,
                "regulation": assessment.regulation,
            })),
    );

    Ok((StatusCode::CREATED, Json(assessment)))
}

/// GET /v1/systems/:id/assessments: List a system's assessments, oldest first.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}/assessments",
    params(("id" = Uuid, Path, description = "System ID"), PaginationParams),
    responses(
        (status = 200, description = "Assessments", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn list_assessments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Vec<RiskAssessment>>, AppError> {
    let system = system_or_404(&state, SystemId::from_uuid(id))?;
    Ok(Json(pagination.apply(assessments_of(&state, system.id))))
}

/// GET /v1/assessments/:id: Get one assessment.
#[utoipa::path(
    get,
    path = "/v1/assessments/{id}",
    params(("id" = Uuid, Path, description = "Assessment ID")),
    responses(
        (status = 200, description = "Assessment found", body = serde_json::Value),
        (status = 404, description = "Assessment not found", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiskAssessment>, AppError> {
    let id = AssessmentId::from_uuid(id);
    state
        .assessments
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("risk assessment {id} not found")))
}

/// POST /v1/assessments/:id/submit: Submit a draft for review. Author only.
#[utoipa::path(
    post,
    path = "/v1/assessments/{id}/submit",
    params(("id" = Uuid, Path, description = "Assessment ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Submitted", body = serde_json::Value),
        (status = 403, description = "Caller is not the author", body = ErrorBody),
        (status = 409, description = "Not a draft, vetoed, or stale revision", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn submit_assessment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<RiskAssessment>, AppError> {
    require_role(&caller, Role::Contributor)?;
    let req = extract_json(body)?;
    let (assessment, previous) = transition(
        &state,
        &caller,
        AssessmentId::from_uuid(id),
        req.expected_revision,
        |a, ctx| a.submit(ctx),
    )?;
    commit(
        &state,
        &caller,
        &assessment,
        previous,
        AuditEntryType::AssessmentSubmitted,
        serde_json::json!({ "revision": assessment.revision }),
    )
    .await?;
    Ok(Json(assessment))
}

/// POST /v1/assessments/:id/approve: Approve a submitted assessment.
///
/// The approver must differ from the author. Of two racing approvals
/// carrying the same `expected_revision`, exactly one succeeds.
#[utoipa::path(
    post,
    path = "/v1/assessments/{id}/approve",
    params(("id" = Uuid, Path, description = "Assessment ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Approved", body = serde_json::Value),
        (status = 403, description = "Self-approval or insufficient role", body = ErrorBody),
        (status = 409, description = "Not submitted, vetoed, or stale revision", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn approve_assessment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<RiskAssessment>, AppError> {
    require_role(&caller, Role::Reviewer)?;
    let req = extract_json(body)?;
    let (assessment, previous) = transition(
        &state,
        &caller,
        AssessmentId::from_uuid(id),
        req.expected_revision,
        |a, ctx| a.approve(ctx),
    )?;
    commit(
        &state,
        &caller,
        &assessment,
        previous,
        AuditEntryType::AssessmentApproved,
        serde_json::json!({
            "assessed_by": assessment.assessed_by,
            "risk_level": assessment.risk_level,
        }),
    )
    .await?;
    Ok(Json(assessment))
}

/// POST /v1/assessments/:id/reject: Reject a submitted assessment.
#[utoipa::path(
    post,
    path = "/v1/assessments/{id}/reject",
    params(("id" = Uuid, Path, description = "Assessment ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected", body = serde_json::Value),
        (status = 409, description = "Not submitted, vetoed, or stale revision", body = ErrorBody),
        (status = 422, description = "Blank comment", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn reject_assessment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<RiskAssessment>, AppError> {
    require_role(&caller, Role::Reviewer)?;
    let req = extract_json(body)?;
    let (assessment, previous) = transition(
        &state,
        &caller,
        AssessmentId::from_uuid(id),
        req.expected_revision,
        |a, ctx| a.reject(ctx, &req.comment),
    )?;
    commit(
        &state,
        &caller,
        &assessment,
        previous,
        AuditEntryType::AssessmentRejected,
        serde_json::json!({ "comment": assessment.review_comment }),
    )
    .await?;
    Ok(Json(assessment))
}

/// POST /v1/assessments/:id/mitigation: Change the mitigation status.
#[utoipa::path(
    post,
    path = "/v1/assessments/{id}/mitigation",
    params(("id" = Uuid, Path, description = "Assessment ID")),
    request_body = MitigationRequest,
    responses(
        (status = 200, description = "Mitigation updated", body = serde_json::Value),
        (status = 409, description = "Not submitted, vetoed, or stale revision", body = ErrorBody),
    ),
    tag = "assessments"
)]
async fn update_mitigation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<MitigationRequest>, JsonRejection>,
) -> Result<Json<RiskAssessment>, AppError> {
    require_role(&caller, Role::Contributor)?;
    let req = extract_json(body)?;
    let (assessment, previous) = transition(
        &state,
        &caller,
        AssessmentId::from_uuid(id),
        req.expected_revision,
        |a, ctx| a.update_mitigation_status(ctx, req.mitigation_status),
    )?;
    commit(
        &state,
        &caller,
        &assessment,
        previous,
        AuditEntryType::MitigationUpdated,
        serde_json::json!({ "mitigation_status": assessment.mitigation_status }),
    )
    .await?;
    Ok(Json(assessment))
}
