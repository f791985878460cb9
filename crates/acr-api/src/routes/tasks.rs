//! # Governance Task API
//!
//! Tasks are derived on every read; completing one records an attestation
//! keyed by `(system, task id)`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use acr_core::SystemId;
use acr_governance::{
    complete_task, derive_all, AuditEntry, AuditEntryType, CompletionAttestation, GovernanceTask,
};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_json;
use crate::orchestration::{audit, persisted, SystemSnapshot};
use crate::state::AppState;

/// Body of a task completion.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteTaskRequest {
    /// Optional absolute URI of supporting evidence.
    pub evidence_link: Option<String>,
}

/// Build the task router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/systems/:id/tasks", get(list_tasks))
        .route("/v1/systems/:id/tasks/:task_id/complete", post(complete))
}

/// GET /v1/systems/:id/tasks: Derived governance tasks.
///
/// Grouped by regulation in the order EU AI Act, UK, MAS.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}/tasks",
    params(("id" = Uuid, Path, description = "System ID")),
    responses(
        (status = 200, description = "Derived tasks", body = serde_json::Value),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "tasks"
)]
async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GovernanceTask>>, AppError> {
    let snapshot = SystemSnapshot::load(&state, SystemId::from_uuid(id))?;
    Ok(Json(snapshot.tasks(&state)?))
}

/// POST /v1/systems/:id/tasks/:task_id/complete: Attest completion of a task.
#[utoipa::path(
    post,
    path = "/v1/systems/{id}/tasks/{task_id}/complete",
    params(
        ("id" = Uuid, Path, description = "System ID"),
        ("task_id" = String, Path, description = "Derived task ID, e.g. `mas:bias:assess_policy`"),
    ),
    request_body = CompleteTaskRequest,
    responses(
        (status = 201, description = "Completion recorded", body = serde_json::Value),
        (status = 404, description = "System or task not found", body = ErrorBody),
        (status = 409, description = "Task cannot be attested now", body = ErrorBody),
        (status = 422, description = "Invalid evidence link", body = ErrorBody),
    ),
    tag = "tasks"
)]
async fn complete(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, task_id)): Path<(Uuid, String)>,
    body: Result<Json<CompleteTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CompletionAttestation>), AppError> {
    require_role(&caller, Role::Contributor)?;
    let req = extract_json(body)?;
    let system_id = SystemId::from_uuid(id);
    let snapshot = SystemSnapshot::load(&state, system_id)?;

    // Derive and record under the ledger write lock so a concurrent
    // completion of the same task sees this one.
    let attestation = {
        let mut ledger = state.completions.write();
        let tasks = derive_all(&snapshot.input(&state.rulesets), &ledger)?;
        let attestation = complete_task(
            &tasks,
            system_id,
            &task_id,
            &caller.actor,
            req.evidence_link.as_deref(),
        )?;
        ledger.record(attestation.clone());
        attestation
    };

    if let Some(pool) = &state.db_pool {
        persisted(
            crate::db::completions::upsert(pool, &attestation).await,
            "task completion",
            &attestation.task_id,
        )?;
    }

    tracing::info!(
        system_id = %system_id,
        task_id = %attestation.task_id,
        actor = %caller.actor,
        "governance task completed"
    );
    audit(
        &state,
        AuditEntry::new(AuditEntryType::TaskCompleted, &caller.actor)
            .system(system_id)
            .subject(&attestation.task_id)
            .metadata(serde_json::json!({ "evidence_link": attestation.evidence_link })),
    );

    Ok((StatusCode::CREATED, Json(attestation)))
}
