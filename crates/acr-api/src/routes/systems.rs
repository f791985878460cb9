//! # AI System Registry API
//!
//! Registration, partial updates with guarded writes on prohibited systems,
//! the approved-risk rollup, and sign-off activation.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use acr_core::{
    DataUsage, JurisdictionFlags, LifecycleStage, RiskCategory, RiskLevel, SystemId, SystemStatus,
};
use acr_governance::{signoff_readiness, AuditEntry, AuditEntryType, SignOffReadiness};
use acr_state::{aggregate_risk, AiSystem, NewSystem, SystemError, SystemPatch};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, extract_validated_json, PaginationParams, Validate};
use crate::orchestration::{
    assessments_of, audit, persisted, persisted_conditional, system_or_404, SystemSnapshot,
};
use crate::state::AppState;

/// Reason code returned when activation is refused.
pub const BLOCKING_TASKS_OUTSTANDING: &str = "BLOCKING_TASKS_OUTSTANDING";

/// Request to register an AI system.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterSystemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `{"eu": bool, "uk": bool, "mas": bool}`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub jurisdictions: JurisdictionFlags,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data_usage: DataUsage,
    /// Defaults to `draft`. `active` is only reachable through sign-off.
    #[schema(value_type = Option<String>)]
    pub status: Option<SystemStatus>,
    /// Defaults to `design`.
    #[schema(value_type = Option<String>)]
    pub lifecycle_stage: Option<LifecycleStage>,
}

impl Validate for RegisterSystemRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

impl From<RegisterSystemRequest> for NewSystem {
    fn from(req: RegisterSystemRequest) -> Self {
        NewSystem {
            name: req.name,
            description: req.description,
            jurisdictions: req.jurisdictions,
            data_usage: req.data_usage,
            status: req.status,
            lifecycle_stage: req.lifecycle_stage,
        }
    }
}

/// Partial update of an AI system. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSystemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub jurisdictions: Option<JurisdictionFlags>,
    #[schema(value_type = Option<Object>)]
    pub data_usage: Option<DataUsage>,
    #[schema(value_type = Option<String>)]
    pub status: Option<SystemStatus>,
    #[schema(value_type = Option<String>)]
    pub lifecycle_stage: Option<LifecycleStage>,
    /// Required when the change would understate the risk of a prohibited system.
    pub remediation_note: Option<String>,
    /// Optimistic concurrency check against `system_version`.
    pub expected_version: Option<u64>,
}

impl From<UpdateSystemRequest> for SystemPatch {
    fn from(req: UpdateSystemRequest) -> Self {
        SystemPatch {
            name: req.name,
            description: req.description,
            jurisdictions: req.jurisdictions,
            data_usage: req.data_usage,
            status: req.status,
            lifecycle_stage: req.lifecycle_stage,
            remediation_note: req.remediation_note,
            expected_version: req.expected_version,
        }
    }
}

/// Highest risk level among approved assessments.
#[derive(Debug, Serialize, ToSchema)]
pub struct RiskRollup {
    pub system_id: Uuid,
    /// `None` when no assessment is approved.
    #[schema(value_type = Option<String>)]
    pub overall: Option<RiskLevel>,
    /// Per-category maximum over approved assessments.
    #[schema(value_type = Object)]
    pub by_category: BTreeMap<RiskCategory, RiskLevel>,
    pub approved_assessments: usize,
}

/// Build the system registry router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/systems", get(list_systems).post(register_system))
        .route("/v1/systems/:id", get(get_system).patch(update_system))
        .route("/v1/systems/:id/risk", get(get_risk))
        .route("/v1/systems/:id/signoff", get(get_signoff))
        .route("/v1/systems/:id/activate", post(activate_system))
}

/// POST /v1/systems: Register an AI system.
#[utoipa::path(
    post,
    path = "/v1/systems",
    request_body = RegisterSystemRequest,
    responses(
        (status = 201, description = "System registered at version 1", body = serde_json::Value),
        (status = 422, description = "Validation failed", body = ErrorBody),
    ),
    tag = "systems"
)]
async fn register_system(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<RegisterSystemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AiSystem>), AppError> {
    require_role(&caller, Role::Contributor)?;
    let req = extract_validated_json(body)?;
    let system = AiSystem::register(req.into(), caller.actor.clone())?;
    state.systems.insert(system.id, system.clone());

    if let Some(pool) = &state.db_pool {
        persisted(crate::db::systems::insert(pool, &system).await, "ai system", system.id)?;
    }

    tracing::info!(system_id = %system.id, actor = %caller.actor, "ai system registered");
    audit(
        &state,
        AuditEntry::new(AuditEntryType::SystemRegistered, &caller.actor)
            .system(system.id)
            .metadata(serde_json::json!({
                "status": system.status,
                "jurisdictions": system.jurisdictions,
            })),
    );

    Ok((StatusCode::CREATED, Json(system)))
}

/// GET /v1/systems: List systems, oldest first.
#[utoipa::path(
    get,
    path = "/v1/systems",
    params(PaginationParams),
    responses((status = 200, description = "Registered systems", body = serde_json::Value)),
    tag = "systems"
)]
async fn list_systems(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Json<Vec<AiSystem>> {
    let mut all = state.systems.list();
    all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Json(pagination.apply(all))
}

/// GET /v1/systems/:id: Get a system.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}",
    params(("id" = Uuid, Path, description = "System ID")),
    responses(
        (status = 200, description = "System found", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "systems"
)]
async fn get_system(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AiSystem>, AppError> {
    Ok(Json(system_or_404(&state, SystemId::from_uuid(id))?))
}

/// PATCH /v1/systems/:id: Partially update a system.
///
/// Every successful update increments `system_version` by one inside the
/// same locked update as the field changes.
#[utoipa::path(
    patch,
    path = "/v1/systems/{id}",
    params(("id" = Uuid, Path, description = "System ID")),
    request_body = UpdateSystemRequest,
    responses(
        (status = 200, description = "System updated", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
        (status = 409, description = "Guarded write refused or version conflict", body = ErrorBody),
        (status = 422, description = "Empty or invalid patch", body = ErrorBody),
    ),
    tag = "systems"
)]
async fn update_system(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateSystemRequest>, JsonRejection>,
) -> Result<Json<AiSystem>, AppError> {
    require_role(&caller, Role::Contributor)?;
    let patch: SystemPatch = extract_json(body)?.into();
    let id = SystemId::from_uuid(id);

    let outcome = state
        .systems
        .try_update(&id, |system| {
            let previous = system.system_version;
            system.apply_patch(&patch, &caller.actor)?;
            Ok::<_, SystemError>((system.clone(), previous))
        })
        .ok_or_else(|| AppError::NotFound(format!("ai system {id} not found")))?;

    let (system, previous) = match outcome {
        Ok(updated) => updated,
        Err(err) => {
            if let SystemError::GuardedWrite { reason, .. } = &err {
                tracing::warn!(
                    system_id = %id,
                    actor = %caller.actor,
                    %reason,
                    "guarded write refused"
                );
                audit(
                    &state,
                    AuditEntry::new(AuditEntryType::GuardedWriteRefused, &caller.actor)
                        .system(id)
                        .metadata(serde_json::json!({ "reason": reason })),
                );
            }
            return Err(err.into());
        }
    };

    if let Some(pool) = &state.db_pool {
        persisted_conditional(
            crate::db::systems::update(pool, &system, previous).await,
            "ai system",
            id,
        )?;
    }

    tracing::info!(system_id = %id, system_version = system.system_version, "ai system updated");
    audit(
        &state,
        AuditEntry::new(AuditEntryType::SystemUpdated, &caller.actor)
            .system(id)
            .metadata(serde_json::json!({
                "system_version": system.system_version,
                "status": system.status,
                "remediation_note": patch.remediation_note.is_some(),
            })),
    );

    Ok(Json(system))
}

/// GET /v1/systems/:id/risk: Approved-risk rollup.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}/risk",
    params(("id" = Uuid, Path, description = "System ID")),
    responses(
        (status = 200, description = "Risk rollup", body = RiskRollup),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "systems"
)]
async fn get_risk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiskRollup>, AppError> {
    let system_id = SystemId::from_uuid(id);
    system_or_404(&state, system_id)?;
    let assessments = assessments_of(&state, system_id);

    let mut by_category = BTreeMap::new();
    for category in RiskCategory::ALL {
        if let Some(level) = aggregate_risk(assessments.iter().filter(|a| a.category == category)) {
            by_category.insert(category, level);
        }
    }

    Ok(Json(RiskRollup {
        system_id: id,
        overall: aggregate_risk(&assessments),
        by_category,
        approved_assessments: assessments.iter().filter(|a| a.is_approved()).count(),
    }))
}

/// GET /v1/systems/:id/signoff: Blocking tasks that prevent activation.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}/signoff",
    params(("id" = Uuid, Path, description = "System ID")),
    responses(
        (status = 200, description = "Sign-off readiness", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "systems"
)]
async fn get_signoff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SignOffReadiness>, AppError> {
    let snapshot = SystemSnapshot::load(&state, SystemId::from_uuid(id))?;
    Ok(Json(signoff_readiness(&snapshot.tasks(&state)?)))
}

/// POST /v1/systems/:id/activate: Sign off and activate a system.
#[utoipa::path(
    post,
    path = "/v1/systems/{id}/activate",
    params(("id" = Uuid, Path, description = "System ID")),
    responses(
        (status = 200, description = "System activated", body = serde_json::Value),
        (status = 403, description = "Blocking tasks outstanding", body = ErrorBody),
        (status = 404, description = "System not found", body = ErrorBody),
        (status = 409, description = "Status does not allow activation", body = ErrorBody),
    ),
    tag = "systems"
)]
async fn activate_system(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<AiSystem>, AppError> {
    require_role(&caller, Role::Reviewer)?;
    let id = SystemId::from_uuid(id);

    let snapshot = SystemSnapshot::load(&state, id)?;
    let readiness = signoff_readiness(&snapshot.tasks(&state)?);
    if !readiness.ready {
        tracing::warn!(
            system_id = %id,
            outstanding = readiness.outstanding.len(),
            "activation refused: blocking tasks outstanding"
        );
        return Err(AppError::Forbidden {
            code: BLOCKING_TASKS_OUTSTANDING,
            message: format!(
                "{} blocking task(s) must be completed before sign-off",
                readiness.outstanding.len()
            ),
            details: Some(serde_json::json!({ "outstanding": readiness.outstanding })),
        });
    }

    let (system, previous) = state
        .systems
        .try_update(&id, |system| {
            let previous = system.system_version;
            system.activate(&caller.actor)?;
            Ok::<_, SystemError>((system.clone(), previous))
        })
        .ok_or_else(|| AppError::NotFound(format!("ai system {id} not found")))??;

    if let Some(pool) = &state.db_pool {
        persisted_conditional(
            crate::db::systems::update(pool, &system, previous).await,
            "ai system",
            id,
        )?;
    }

    tracing::info!(system_id = %id, actor = %caller.actor, "ai system activated");
    audit(
        &state,
        AuditEntry::new(AuditEntryType::SystemActivated, &caller.actor)
            .system(id)
            .metadata(serde_json::json!({ "system_version": system.system_version })),
    );

    Ok(Json(system))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// The systems router alone, without the auth middleware.
    fn systems_app(state: AppState) -> Router<()> {
        router().with_state(state)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn writes_without_caller_identity_are_unauthorized() {
        let app = systems_app(AppState::new());
        let request = Request::builder()
            .method("POST")
            .uri("/v1/systems")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Triage Assistant"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn reads_need_no_identity() {
        let state = AppState::new();
        let actor = acr_core::ActorId::new("alice").unwrap();
        let system = AiSystem::register(
            NewSystem {
                name: "Triage Assistant".into(),
                ..NewSystem::default()
            },
            actor,
        )
        .unwrap();
        state.systems.insert(system.id, system.clone());

        let response = systems_app(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/systems/{}/risk", system.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rollup = body_json(response).await;
        assert!(rollup["overall"].is_null());
        assert_eq!(rollup["approved_assessments"], 0);
    }

    #[test]
    fn update_request_maps_every_field() {
        let req: UpdateSystemRequest = serde_json::from_value(serde_json::json!({
            "status": "prohibited",
            "remediation_note": "pending legal review",
            "expected_version": 4
        }))
        .unwrap();
        let patch = SystemPatch::from(req);
        assert_eq!(patch.status, Some(SystemStatus::Prohibited));
        assert_eq!(patch.expected_version, Some(4));
        assert!(patch.name.is_none());
    }
}
