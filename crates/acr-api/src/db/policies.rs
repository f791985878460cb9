//! Policy and policy mapping persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use acr_core::{MappingId, PolicyId, SystemId, Timestamp};
use acr_state::{Policy, PolicyMapping};

use super::{actor, enum_to_text, from_i64, from_json, text_to_enum, to_i64, to_json};

/// Insert a policy.
pub async fn insert_policy(pool: &PgPool, policy: &Policy) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO policies (id, name, kind, description, regulations, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(policy.id.as_uuid())
    .bind(&policy.name)
    .bind(enum_to_text(&policy.kind)?)
    .bind(&policy.description)
    .bind(to_json("regulations", &policy.regulations)?)
    .bind(policy.created_by.as_str())
    .bind(policy.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a new mapping. The `(system_id, policy_id)` pair is unique.
pub async fn insert_mapping(pool: &PgPool, m: &PolicyMapping) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO policy_mappings (id, policy_id, system_id, compliance_status, notes,
         assessed_at, assessed_by, created_by, revision, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(m.id.as_uuid())
    .bind(m.policy_id.as_uuid())
    .bind(m.system_id.as_uuid())
    .bind(enum_to_text(&m.compliance_status)?)
    .bind(&m.notes)
    .bind(m.assessed_at.as_ref().map(Timestamp::as_datetime))
    .bind(m.assessed_by.as_ref().map(|a| a.as_str()))
    .bind(m.created_by.as_str())
    .bind(to_i64("revision", m.revision)?)
    .bind(m.created_at.as_datetime())
    .bind(m.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write a mapping's status, conditional on the stored revision being
/// `previous_revision`. Returns `false` when no row matched.
pub async fn update_mapping(
    pool: &PgPool,
    m: &PolicyMapping,
    previous_revision: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE policy_mappings SET compliance_status = $1, notes = $2, assessed_at = $3,
         assessed_by = $4, revision = $5, updated_at = $6
         WHERE id = $7 AND revision = $8",
    )
    .bind(enum_to_text(&m.compliance_status)?)
    .bind(&m.notes)
    .bind(m.assessed_at.as_ref().map(Timestamp::as_datetime))
    .bind(m.assessed_by.as_ref().map(|a| a.as_str()))
    .bind(to_i64("revision", m.revision)?)
    .bind(m.updated_at.as_datetime())
    .bind(m.id.as_uuid())
    .bind(to_i64("revision", previous_revision)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all policies on startup.
pub async fn load_policies(pool: &PgPool) -> Result<Vec<Policy>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PolicyRow>(
        "SELECT id, name, kind, description, regulations, created_by, created_at
         FROM policies ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PolicyRow::into_record).collect()
}

/// Load all mappings on startup.
pub async fn load_mappings(pool: &PgPool) -> Result<Vec<PolicyMapping>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MappingRow>(
        "SELECT id, policy_id, system_id, compliance_status, notes, assessed_at, assessed_by,
         created_by, revision, created_at, updated_at
         FROM policy_mappings ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(MappingRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    id: Uuid,
    name: String,
    kind: String,
    description: String,
    regulations: serde_json::Value,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl PolicyRow {
    fn into_record(self) -> Result<Policy, sqlx::Error> {
        Ok(Policy {
            id: PolicyId::from_uuid(self.id),
            name: self.name,
            kind: text_to_enum("kind", &self.kind)?,
            description: self.description,
            regulations: from_json("regulations", self.regulations)?,
            created_by: actor("created_by", self.created_by)?,
            created_at: Timestamp::from_datetime(self.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    id: Uuid,
    policy_id: Uuid,
    system_id: Uuid,
    compliance_status: String,
    notes: Option<String>,
    assessed_at: Option<DateTime<Utc>>,
    assessed_by: Option<String>,
    created_by: String,
    revision: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MappingRow {
    fn into_record(self) -> Result<PolicyMapping, sqlx::Error> {
        Ok(PolicyMapping {
            id: MappingId::from_uuid(self.id),
            policy_id: PolicyId::from_uuid(self.policy_id),
            system_id: SystemId::from_uuid(self.system_id),
            compliance_status: text_to_enum("compliance_status", &self.compliance_status)?,
            notes: self.notes,
            assessed_at: self.assessed_at.map(Timestamp::from_datetime),
            assessed_by: self
                .assessed_by
                .map(|a| actor("assessed_by", a))
                .transpose()?,
            created_by: actor("created_by", self.created_by)?,
            revision: from_i64("revision", self.revision)?,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}
