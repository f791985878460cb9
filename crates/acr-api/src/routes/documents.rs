//! # Compliance Documentation API
//!
//! Generation appends a new immutable version; reads attach the derived
//! staleness status, recomputed against the current system and approved
//! assessments on every request.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use acr_core::{DocumentId, DocumentType, Regulation, SystemId};
use acr_governance::{AuditEntry, AuditEntryType};
use acr_state::{
    generate, next_version, ComplianceDocumentation, DocumentStatus, DocumentationError,
    GenerationReason, GenerationRequest, StalenessReason, StalenessReport,
};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_json;
use crate::orchestration::{assessments_of, audit, evaluate_document, persisted, system_or_404};
use crate::state::AppState;

/// Target of a generation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateDocumentRequest {
    /// `eu_ai_act`, `uk_ai_act` or `mas`.
    #[schema(value_type = String)]
    pub regulation: Regulation,
    /// e.g. `risk_management_report`.
    #[schema(value_type = String)]
    pub document_type: DocumentType,
}

/// A stored version together with its derived status.
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentView {
    #[schema(value_type = Object)]
    pub document: ComplianceDocumentation,
    /// `current`, `outdated` or `requires_regeneration`.
    #[schema(value_type = String)]
    pub status: DocumentStatus,
    /// Every condition that made the document stale. Empty when current.
    #[schema(value_type = Vec<Object>)]
    pub reasons: Vec<StalenessReason>,
}

impl DocumentView {
    fn new(document: ComplianceDocumentation, report: StalenessReport) -> Self {
        Self {
            document,
            status: report.status,
            reasons: report.reasons,
        }
    }
}

/// Filters for listing a system's documents.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentQuery {
    /// Restrict to one regulation.
    #[param(value_type = Option<String>)]
    pub regulation: Option<Regulation>,
    /// Restrict to one document type.
    #[param(value_type = Option<String>)]
    pub document_type: Option<DocumentType>,
    /// Only the newest version of each `(regulation, document_type)`.
    pub latest: Option<bool>,
}

/// Build the documentation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/systems/:id/documents",
            get(list_documents).post(generate_document),
        )
        .route("/v1/systems/:id/documents/regenerate", post(regenerate_document))
        .route("/v1/documents/:id", get(get_document))
}

async fn generate_version(
    state: &AppState,
    caller: &CallerIdentity,
    system_id: SystemId,
    req: GenerateDocumentRequest,
    reason: GenerationReason,
) -> Result<DocumentView, AppError> {
    require_role(caller, Role::Contributor)?;
    let system = system_or_404(state, system_id)?;
    let assessments = assessments_of(state, system_id);

    // Version allocation and insert share the documents write lock.
    let document = state
        .documents
        .insert_with(|existing| {
            let version =
                next_version(existing.values(), system_id, req.regulation, req.document_type);
            let document = generate(
                &GenerationRequest {
                    system: &system,
                    regulation: req.regulation,
                    document_type: req.document_type,
                    assessments: &assessments,
                    rulesets: &state.rulesets,
                    version,
                    actor: &caller.actor,
                    reason,
                },
                state.generator.as_ref(),
            )?;
            Ok::<_, DocumentationError>((document.id, document))
        })
        .map_err(|err| {
            if let DocumentationError::Forbidden { reason, .. } = &err {
                tracing::warn!(system_id = %system_id, %reason, "documentation generation refused");
            }
            AppError::from(err)
        })?;

    if let Some(pool) = &state.db_pool {
        persisted(
            crate::db::documents::insert(pool, &document).await,
            "compliance document",
            document.id,
        )?;
    }

    tracing::info!(
        document_id = %document.id,
        system_id = %system_id,
        regulation = %document.regulation,
        document_type = %document.document_type,
        version = document.version,
        %reason,
        "compliance document generated"
    );
    let entry_type = match reason {
        GenerationReason::Generate => AuditEntryType::DocumentGenerated,
        GenerationReason::Regenerate => AuditEntryType::DocumentRegenerated,
    };
    audit(
        state,
        AuditEntry::new(entry_type, &caller.actor)
            .system(system_id)
            .subject(document.id)
            .metadata(serde_json::json!({
                "regulation": document.regulation,
                "document_type": document.document_type,
                "version": document.version,
                "ai_system_version": document.ai_system_version,
            })),
    );

    let report = evaluate_document(&document, &system, &assessments, &state.rulesets)?;
    Ok(DocumentView::new(document, report))
}

/// POST /v1/systems/:id/documents: Generate a new document version.
#[utoipa::path(
    post,
    path = "/v1/systems/{id}/documents",
    params(("id" = Uuid, Path, description = "System ID")),
    request_body = GenerateDocumentRequest,
    responses(
        (status = 201, description = "Version created", body = DocumentView),
        (status = 403, description = "System is prohibited", body = ErrorBody),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn generate_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<GenerateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentView>), AppError> {
    let req = extract_json(body)?;
    let view = generate_version(
        &state,
        &caller,
        SystemId::from_uuid(id),
        req,
        GenerationReason::Generate,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /v1/systems/:id/documents/regenerate: Generate a new version, recorded as a regeneration.
#[utoipa::path(
    post,
    path = "/v1/systems/{id}/documents/regenerate",
    params(("id" = Uuid, Path, description = "System ID")),
    request_body = GenerateDocumentRequest,
    responses(
        (status = 201, description = "Version created", body = DocumentView),
        (status = 403, description = "System is prohibited", body = ErrorBody),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn regenerate_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<GenerateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentView>), AppError> {
    let req = extract_json(body)?;
    let view = generate_version(
        &state,
        &caller,
        SystemId::from_uuid(id),
        req,
        GenerationReason::Regenerate,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /v1/systems/:id/documents: List versions with derived status.
///
/// Ordered by regulation, document type, then version.
#[utoipa::path(
    get,
    path = "/v1/systems/{id}/documents",
    params(("id" = Uuid, Path, description = "System ID"), DocumentQuery),
    responses(
        (status = 200, description = "Document versions", body = Vec<DocumentView>),
        (status = 404, description = "System not found", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn list_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<DocumentView>>, AppError> {
    let system = system_or_404(&state, SystemId::from_uuid(id))?;
    let assessments = assessments_of(&state, system.id);

    let mut documents = state.documents.filter(|d| {
        d.system_id == system.id
            && query.regulation.map_or(true, |r| d.regulation == r)
            && query.document_type.map_or(true, |t| d.document_type == t)
    });
    documents.sort_by_key(|d| (d.regulation, d.document_type, d.version));

    if query.latest.unwrap_or(false) {
        let mut newest: BTreeMap<(Regulation, DocumentType), ComplianceDocumentation> =
            BTreeMap::new();
        for document in documents {
            newest.insert((document.regulation, document.document_type), document);
        }
        documents = newest.into_values().collect();
    }

    let views = documents
        .into_iter()
        .map(|document| {
            let report = evaluate_document(&document, &system, &assessments, &state.rulesets)?;
            Ok(DocumentView::new(document, report))
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(Json(views))
}

/// GET /v1/documents/:id: View one version with its staleness report.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document found", body = DocumentView),
        (status = 404, description = "Document not found", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentView>, AppError> {
    let id = DocumentId::from_uuid(id);
    let document = state
        .documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("compliance document {id} not found")))?;
    let system = system_or_404(&state, document.system_id)?;
    let assessments = assessments_of(&state, system.id);
    let report = evaluate_document(&document, &system, &assessments, &state.rulesets)?;
    Ok(Json(DocumentView::new(document, report)))
}
