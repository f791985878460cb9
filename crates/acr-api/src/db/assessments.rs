//! Risk assessment persistence.
//!
//! `status` and `revision` are real columns; transition guards live in
//! `acr-state`, the table only enforces the four-eyes invariant as a check
//! constraint.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use acr_core::{AssessmentId, Regulation, SystemId, Timestamp};
use acr_state::RiskAssessment;

use super::{actor, enum_to_text, from_i64, from_json, text_to_enum, to_i64, to_json};

/// Insert a newly created assessment.
pub async fn insert(pool: &PgPool, a: &RiskAssessment) -> Result<(), sqlx::Error> {
    let regulation = a.regulation.as_ref().map(enum_to_text).transpose()?;
    sqlx::query(
        "INSERT INTO risk_assessments (id, system_id, category, regulation, risk_level,
         mitigation_status, status, summary, evidence_links, evidence_text, assessed_by,
         reviewed_by, reviewed_at, review_comment, supersedes, revision, transitions,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                 $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(a.id.as_uuid())
    .bind(a.system_id.as_uuid())
    .bind(enum_to_text(&a.category)?)
    .bind(regulation)
    .bind(enum_to_text(&a.risk_level)?)
    .bind(enum_to_text(&a.mitigation_status)?)
    .bind(enum_to_text(&a.status)?)
    .bind(&a.summary)
    .bind(to_json("evidence_links", &a.evidence_links)?)
    .bind(&a.evidence_text)
    .bind(a.assessed_by.as_str())
    .bind(a.reviewed_by.as_ref().map(|r| r.as_str()))
    .bind(a.reviewed_at.as_ref().map(Timestamp::as_datetime))
    .bind(&a.review_comment)
    .bind(a.supersedes.as_ref().map(AssessmentId::as_uuid))
    .bind(to_i64("revision", a.revision)?)
    .bind(to_json("transitions", &a.transitions)?)
    .bind(a.created_at.as_datetime())
    .bind(a.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the mutable columns after a transition, conditional on the stored
/// revision being `previous_revision`. Returns `false` when no row matched.
pub async fn update(
    pool: &PgPool,
    a: &RiskAssessment,
    previous_revision: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE risk_assessments SET mitigation_status = $1, status = $2, reviewed_by = $3,
         reviewed_at = $4, review_comment = $5, revision = $6, transitions = $7, updated_at = $8
         WHERE id = $9 AND revision = $10",
    )
    .bind(enum_to_text(&a.mitigation_status)?)
    .bind(enum_to_text(&a.status)?)
    .bind(a.reviewed_by.as_ref().map(|r| r.as_str()))
    .bind(a.reviewed_at.as_ref().map(Timestamp::as_datetime))
    .bind(&a.review_comment)
    .bind(to_i64("revision", a.revision)?)
    .bind(to_json("transitions", &a.transitions)?)
    .bind(a.updated_at.as_datetime())
    .bind(a.id.as_uuid())
    .bind(to_i64("revision", previous_revision)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all assessments on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<RiskAssessment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AssessmentRow>(
        "SELECT id, system_id, category, regulation, risk_level, mitigation_status, status,
         summary, evidence_links, evidence_text, assessed_by, reviewed_by, reviewed_at,
         review_comment, supersedes, revision, transitions, created_at, updated_at
         FROM risk_assessments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AssessmentRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: Uuid,
    system_id: Uuid,
    category: String,
    regulation: Option<String>,
    risk_level: String,
    mitigation_status: String,
    status: String,
    summary: String,
    evidence_links: serde_json::Value,
    evidence_text: Option<String>,
    assessed_by: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    review_comment: Option<String>,
    supersedes: Option<Uuid>,
    revision: i64,
    transitions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssessmentRow {
    fn into_record(self) -> Result<RiskAssessment, sqlx::Error> {
        let regulation: Option<Regulation> = self
            .regulation
            .as_deref()
            .map(|r| text_to_enum("regulation", r))
            .transpose()?;
        Ok(RiskAssessment {
            id: AssessmentId::from_uuid(self.id),
            system_id: SystemId::from_uuid(self.system_id),
            category: text_to_enum("category", &self.category)?,
            regulation,
            risk_level: text_to_enum("risk_level", &self.risk_level)?,
            mitigation_status: text_to_enum("mitigation_status", &self.mitigation_status)?,
            status: text_to_enum("status", &self.status)?,
            summary: self.summary,
            evidence_links: from_json("evidence_links", self.evidence_links)?,
            evidence_text: self.evidence_text,
            assessed_by: actor("assessed_by", self.assessed_by)?,
            reviewed_by: self
                .reviewed_by
                .map(|r| actor("reviewed_by", r))
                .transpose()?,
            reviewed_at: self.reviewed_at.map(Timestamp::from_datetime),
            review_comment: self.review_comment,
            supersedes: self.supersedes.map(AssessmentId::from_uuid),
            revision: from_i64("revision", self.revision)?,
            transitions: from_json("transitions", self.transitions)?,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}
