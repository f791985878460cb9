//! # Policy Mapping API
//!
//! Policies are created by admins and mapped onto systems. Each
//! `(system, policy)` pair has at most one mapping.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use acr_core::{ComplianceStatus, MappingId, PolicyId, PolicyKind, Regulation, SystemId};
use acr_governance::{AuditEntry, AuditEntryType};
use acr_state::{NewPolicy, Policy, PolicyError, PolicyMapping};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, extract_validated_json, PaginationParams, Validate};
use crate::orchestration::{audit, persisted, persisted_conditional, system_or_404};
use crate::state::AppState;

/// Request to create a policy.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePolicyRequest {
    pub name: String,
    /// `internal` or `external`.
    #[schema(value_type = String)]
    pub kind: PolicyKind,
    #[serde(default)]
    pub description: String,
    /// Regulations the policy supports. Empty means all.
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub regulations: Vec<Regulation>,
}

impl Validate for CreatePolicyRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("policy name must not be empty".to_string());
        }
        Ok(())
    }
}

impl From<CreatePolicyRequest> for NewPolicy {
    fn from(req: CreatePolicyRequest) -> Self {
        NewPolicy {
            name: req.name,
            kind: req.kind,
            description: req.description,
            regulations: req.regulations,
        }
    }
}

/// Request to map a policy onto a system.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MapPolicyRequest {
    pub policy_id: Uuid,
}

/// Request to change a mapping's compliance standing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMappingRequest {
    /// `not_assessed`, `compliant`, `partially_compliant` or `non_compliant`.
    #[schema(value_type = String)]
    pub compliance_status: ComplianceStatus,
    pub notes: Option<String>,
    pub expected_revision: Option<u64>,
}

/// Build the policy router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/policies", get(list_policies).post(create_policy))
        .route("/v1/systems/:id/policies", get(list_mappings).post(map_policy))
        .route("/v1/policy-mappings/:id", patch(update_mapping))
}

/// POST /v1/policies: Create a policy. Admin only.
#[utoipa::path(
    post,
    path = "/v1/policies",
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "Policy created", body = serde_json::Value),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
    ),
    tag = "policies"
)]
async fn create_policy(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreatePolicyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Policy>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let policy = Policy::create(req.into(), caller.actor.clone())?;
    state.policies.insert(policy.id, policy.clone());

    if let Some(pool) = &state.db_pool {
        persisted(crate::db::policies::insert_policy(pool, &policy).await, "policy", policy.id)?;
    }

    tracing::info!(policy_id = %policy.id, kind = %policy.kind, "policy created");
    audit(
        &state,
        AuditEntry::new(AuditEntryType::PolicyCreated, &caller.actor)
            .subject(policy.id)
            .metadata(serde_json::json!({
                "name": policy.name,
                "regulations": policy.regulations,
            })),
    );

    Ok((StatusCode::CREATED, Json(policy)))
}

/// GET /v1/policies: List policies by name.
#[utoipa::path(
    get,
    path = "/v1/policies",
    params(PaginationParams),
    responses((status = 200, description = "Policies", body = serde_json::Value)),
    tag = "policies"
)]
async fn list_policies(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Json<Vec<Policy>> {
    let mut all = state.policies.list();
    all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Json(pagination.apply(all))
}

/// POST /v1/systems/:id/policies: Map a policy onto a system.
#[utoipa::path(
    post,
    path = "/v1/systems/{id}/policies",
    params(("id" = Uuid, Path, description = "System ID")),
    request_body = MapPolicyRequest,
    responses(
        (status = 201, description = "Mapping created as not_assessed", body = serde_json::Value),
        (status = 404, description = "System or policy not found", body = ErrorBody),
        (status = 409, description = "Policy already mapped", body = ErrorBody),
    ),
    tag = "policies"
)]
async fn map_policy(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<MapPolicyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PolicyMapping>), AppError> {
    require_role(&caller, Role::Contributor)?;
    let req = extract_json(body)?;
    let system = system_or_404(&state, SystemId::from_uuid(id))?;
    let policy_id = PolicyId::from_uuid(req.policy_id);
    if !state.policies.contains(&policy_id) {
        return Err(AppError::NotFound(format!("policy {policy_id} not found")));
    }

    let mapping = state.mappings.insert_with(|existing| {
        if existing
            .values()
            .any(|m| m.system_id == system.id && m.policy_id == policy_id)
        {
            return Err(AppError::Conflict(format!(
                "policy {policy_id} is already mapped to system {}",
                system.id
            )));
        }
        let mapping = PolicyMapping::new(system.id, policy_id, caller.actor.clone());
        Ok((mapping.id, mapping))
    })?;

    if let Some(pool) = &state.db_pool {
        persisted(
            crate::db::policies::insert_mapping(pool, &mapping).await,
            "policy mapping",
            mapping.id,
        )?;
    }

    tracing::info!(
        mapping_id = %mapping.id,
        system_id = %system.id,
        policy_id = %policy_id,
        "policy mapped"
    );
    audit(
        &state,
        AuditEntry::new(AuditEntryType::PolicyMapped, &caller.actor)
            .system(system.id)
            .subject(mapping.id)
            .metadata(serde_json::json!({ "policy_id": policy_id })),
    );

    Ok((StatusCode::CREATED, Json(mapping)))
}

/// GET /v1/systems/:id/policies: A system's policy mappings.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}/policies",
    params(("id" = Uuid, Path, description = "System ID")),
    responses(
        (status = 200, description = "Mappings", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "policies"
)]
async fn list_mappings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PolicyMapping>>, AppError> {
    let system = system_or_404(&state, SystemId::from_uuid(id))?;
    let mut mappings = state.mappings.filter(|m| m.system_id == system.id);
    mappings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(Json(mappings))
}

/// PATCH /v1/policy-mappings/:id: Record a compliance standing.
#[utoipa::path(
    patch,
    path = "/v1/policy-mappings/{id}",
    params(("id" = Uuid, Path, description = "Mapping ID")),
    request_body = UpdateMappingRequest,
    responses(
        (status = 200, description = "Mapping updated", body = serde_json::Value),
        (status = 404, description = "Mapping not found", body = ErrorBody),
        (status = 409, description = "Revision conflict", body = ErrorBody),
    ),
    tag = "policies"
)]
async fn update_mapping(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateMappingRequest>, JsonRejection>,
) -> Result<Json<PolicyMapping>, AppError> {
    require_role(&caller, Role::Reviewer)?;
    let req = extract_json(body)?;
    let id = MappingId::from_uuid(id);

    let (mapping, previous) = state
        .mappings
        .try_update(&id, |mapping| {
            let previous = mapping.revision;
            mapping.update_status(
                req.compliance_status,
                req.notes.clone(),
                &caller.actor,
                req.expected_revision,
            )?;
            Ok::<_, PolicyError>((mapping.clone(), previous))
        })
        .ok_or_else(|| AppError::NotFound(format!("policy mapping {id} not found")))??;

    if let Some(pool) = &state.db_pool {
        persisted_conditional(
            crate::db::policies::update_mapping(pool, &mapping, previous).await,
            "policy mapping",
            id,
        )?;
    }

    tracing::info!(mapping_id = %id, status = %mapping.compliance_status, "policy mapping updated");
    audit(
        &state,
        AuditEntry::new(AuditEntryType::PolicyMappingUpdated, &caller.actor)
            .system(mapping.system_id)
            .subject(id)
            .metadata(serde_json::json!({
                "compliance_status": mapping.compliance_status,
                "revision": mapping.revision,
            })),
    );

    Ok(Json(mapping))
}
