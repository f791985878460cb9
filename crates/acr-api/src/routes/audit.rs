//! # Audit Trail API

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use acr_core::SystemId;
use acr_governance::AuditEntry;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Audit trail filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Only entries concerning this system.
    pub system_id: Option<Uuid>,
    /// Most recent N entries (default: 100, max: 1000).
    pub limit: Option<usize>,
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/audit", get(list_audit))
}

/// GET /v1/audit: Most recent audit entries, oldest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = serde_json::Value),
        (status = 403, description = "Caller is not a reviewer", body = ErrorBody),
    ),
    tag = "audit"
)]
async fn list_audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    require_role(&caller, Role::Reviewer)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let trail = state.audit.lock();

    let entries: Vec<AuditEntry> = match query.system_id {
        Some(id) => {
            let matching = trail.for_system(SystemId::from_uuid(id));
            let start = matching.len().saturating_sub(limit);
            matching[start..].iter().map(|e| (*e).clone()).collect()
        }
        None => trail.last_n(limit).to_vec(),
    };
    Ok(Json(entries))
}
