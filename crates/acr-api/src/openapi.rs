//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AI Compliance Records API",
        version = "0.1.0",
        description = "AI system registry, assessment review, documentation and governance tasks.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Systems
        crate::routes::systems::register_system,
        crate::routes::systems::list_systems,
        crate::routes::systems::get_system,
        crate::routes::systems::update_system,
        crate::routes::systems::get_risk,
        crate::routes::systems::get_signoff,
        crate::routes::systems::activate_system,
        // Assessments
        crate::routes::assessments::create_assessment,
        crate::routes::assessments::list_assessments,
        crate::routes::assessments::get_assessment,
        crate::routes::assessments::submit_assessment,
        crate::routes::assessments::approve_assessment,
        crate::routes::assessments::reject_assessment,
        crate::routes::assessments::update_mitigation,
        // Documents
        crate::routes::documents::generate_document,
        crate::routes::documents::regenerate_document,
        crate::routes::documents::list_documents,
        crate::routes::documents::get_document,
        // Tasks
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::complete,
        // Policies
        crate::routes::policies::create_policy,
        crate::routes::policies::list_policies,
        crate::routes::policies::map_policy,
        crate::routes::policies::list_mappings,
        crate::routes::policies::update_mapping,
        // Audit
        crate::routes::audit::list_audit,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::auth::Role,
        crate::routes::systems::RegisterSystemRequest,
        crate::routes::systems::UpdateSystemRequest,
        crate::routes::systems::RiskRollup,
        crate::routes::assessments::CreateAssessmentRequest,
        crate::routes::assessments::TransitionRequest,
        crate::routes::assessments::RejectRequest,
        crate::routes::assessments::MitigationRequest,
        crate::routes::documents::GenerateDocumentRequest,
        crate::routes::documents::DocumentView,
        crate::routes::tasks::CompleteTaskRequest,
        crate::routes::policies::CreatePolicyRequest,
        crate::routes::policies::MapPolicyRequest,
        crate::routes::policies::UpdateMappingRequest,
    )),
    tags(
        (name = "systems", description = "AI system registry and sign-off"),
        (name = "assessments", description = "Risk assessment review workflow"),
        (name = "documents", description = "Versioned compliance documentation"),
        (name = "tasks", description = "Derived governance tasks"),
        (name = "policies", description = "Policy catalog and mappings"),
        (name = "audit", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/systems",
            "/v1/systems/{id}/assessments",
            "/v1/assessments/{id}/approve",
            "/v1/systems/{id}/documents/regenerate",
            "/v1/systems/{id}/tasks/{task_id}/complete",
            "/v1/policy-mappings/{id}",
            "/v1/audit",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
