//! AI system persistence. `system_version` is the optimistic lock.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use acr_core::{SystemId, Timestamp};
use acr_state::AiSystem;

use super::{actor, enum_to_text, from_i64, from_json, text_to_enum, to_i64, to_json};

/// Insert a newly registered system.
pub async fn insert(pool: &PgPool, system: &AiSystem) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ai_systems (id, name, description, jurisdictions, data_usage, status,
         lifecycle_stage, registered_by, system_version, status_history, remediation_notes,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(system.id.as_uuid())
    .bind(&system.name)
    .bind(&system.description)
    .bind(to_json("jurisdictions", &system.jurisdictions)?)
    .bind(to_json("data_usage", &system.data_usage)?)
    .bind(enum_to_text(&system.status)?)
    .bind(enum_to_text(&system.lifecycle_stage)?)
    .bind(system.registered_by.as_str())
    .bind(to_i64("system_version", system.system_version)?)
    .bind(to_json("status_history", &system.status_history)?)
    .bind(to_json("remediation_notes", &system.remediation_notes)?)
    .bind(system.created_at.as_datetime())
    .bind(system.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write an updated system, conditional on the stored version being
/// `previous_version`. Returns `false` when no row matched.
pub async fn update(
    pool: &PgPool,
    system: &AiSystem,
    previous_version: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE ai_systems SET name = $1, description = $2, jurisdictions = $3, data_usage = $4,
         status = $5, lifecycle_stage = $6, system_version = $7, status_history = $8,
         remediation_notes = $9, updated_at = $10
         WHERE id = $11 AND system_version = $12",
    )
    .bind(&system.name)
    .bind(&system.description)
    .bind(to_json("jurisdictions", &system.jurisdictions)?)
    .bind(to_json("data_usage", &system.data_usage)?)
    .bind(enum_to_text(&system.status)?)
    .bind(enum_to_text(&system.lifecycle_stage)?)
    .bind(to_i64("system_version", system.system_version)?)
    .bind(to_json("status_history", &system.status_history)?)
    .bind(to_json("remediation_notes", &system.remediation_notes)?)
    .bind(system.updated_at.as_datetime())
    .bind(system.id.as_uuid())
    .bind(to_i64("system_version", previous_version)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all systems on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AiSystem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SystemRow>(
        "SELECT id, name, description, jurisdictions, data_usage, status, lifecycle_stage,
         registered_by, system_version, status_history, remediation_notes, created_at, updated_at
         FROM ai_systems ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(SystemRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct SystemRow {
    id: Uuid,
    name: String,
    description: String,
    jurisdictions: serde_json::Value,
    data_usage: serde_json::Value,
    status: String,
    lifecycle_stage: String,
    registered_by: String,
    system_version: i64,
    status_history: serde_json::Value,
    remediation_notes: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SystemRow {
    fn into_record(self) -> Result<AiSystem, sqlx::Error> {
        Ok(AiSystem {
            id: SystemId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            jurisdictions: from_json("jurisdictions", self.jurisdictions)?,
            data_usage: from_json("data_usage", self.data_usage)?,
            status: text_to_enum("status", &self.status)?,
            lifecycle_stage: text_to_enum("lifecycle_stage", &self.lifecycle_stage)?,
            registered_by: actor("registered_by", self.registered_by)?,
            system_version: from_i64("system_version", self.system_version)?,
            status_history: from_json("status_history", self.status_history)?,
            remediation_notes: from_json("remediation_notes", self.remediation_notes)?,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}
