//! Compliance document persistence. Rows are append-only; the unique
//! `(system_id, regulation, document_type, version)` key backs the
//! in-memory version allocation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use acr_core::{DocumentId, SystemId, Timestamp};
use acr_state::ComplianceDocumentation;

use super::{enum_to_text, from_i64, from_json, text_to_enum, to_i64, to_json};

/// Insert a generated document version.
pub async fn insert(pool: &PgPool, doc: &ComplianceDocumentation) -> Result<(), sqlx::Error> {
    let version = i32::try_from(doc.version).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query(
        "INSERT INTO compliance_documents (id, system_id, regulation, document_type, version,
         ai_system_version, risk_assessment_version, regulation_version, generation_metadata,
         content, content_digest, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(doc.id.as_uuid())
    .bind(doc.system_id.as_uuid())
    .bind(enum_to_text(&doc.regulation)?)
    .bind(enum_to_text(&doc.document_type)?)
    .bind(version)
    .bind(to_i64("ai_system_version", doc.ai_system_version)?)
    .bind(&doc.risk_assessment_version)
    .bind(&doc.regulation_version)
    .bind(to_json("generation_metadata", &doc.generation_metadata)?)
    .bind(&doc.content)
    .bind(&doc.content_digest)
    .bind(doc.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all document versions on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ComplianceDocumentation>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, system_id, regulation, document_type, version, ai_system_version,
         risk_assessment_version, regulation_version, generation_metadata, content,
         content_digest, created_at
         FROM compliance_documents ORDER BY created_at, version",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DocumentRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    system_id: Uuid,
    regulation: String,
    document_type: String,
    version: i32,
    ai_system_version: i64,
    risk_assessment_version: String,
    regulation_version: String,
    generation_metadata: serde_json::Value,
    content: String,
    content_digest: String,
    created_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_record(self) -> Result<ComplianceDocumentation, sqlx::Error> {
        let version = u32::try_from(self.version).map_err(|e| sqlx::Error::ColumnDecode {
            index: "version".to_string(),
            source: Box::new(e),
        })?;
        Ok(ComplianceDocumentation {
            id: DocumentId::from_uuid(self.id),
            system_id: SystemId::from_uuid(self.system_id),
            regulation: text_to_enum("regulation", &self.regulation)?,
            document_type: text_to_enum("document_type", &self.document_type)?,
            version,
            ai_system_version: from_i64("ai_system_version", self.ai_system_version)?,
            risk_assessment_version: self.risk_assessment_version,
            regulation_version: self.regulation_version,
            generation_metadata: from_json("generation_metadata", self.generation_metadata)?,
            content: self.content,
            content_digest: self.content_digest,
            created_at: Timestamp::from_datetime(self.created_at),
        })
    }
}
