//! Task completion attestations, the only persisted governance-task fact.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use acr_core::{SystemId, Timestamp};
use acr_governance::CompletionAttestation;

use super::actor;

/// Record an attestation. A repeated `(system_id, task_id)` replaces the
/// earlier one, matching the in-memory ledger.
pub async fn upsert(pool: &PgPool, att: &CompletionAttestation) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO task_completions
             (system_id, task_id, completed_by, completed_at, evidence_link, attested_state)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (system_id, task_id) DO UPDATE
         SET completed_by = EXCLUDED.completed_by,
             completed_at = EXCLUDED.completed_at,
             evidence_link = EXCLUDED.evidence_link,
             attested_state = EXCLUDED.attested_state",
    )
    .bind(att.system_id.as_uuid())
    .bind(&att.task_id)
    .bind(att.completed_by.as_str())
    .bind(att.completed_at.as_datetime())
    .bind(&att.evidence_link)
    .bind(&att.attested_state)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all attestations on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CompletionAttestation>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CompletionRow>(
        "SELECT system_id, task_id, completed_by, completed_at, evidence_link, attested_state
         FROM task_completions ORDER BY completed_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CompletionRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct CompletionRow {
    system_id: Uuid,
    task_id: String,
    completed_by: String,
    completed_at: DateTime<Utc>,
    evidence_link: Option<String>,
    attested_state: String,
}

impl CompletionRow {
    fn into_record(self) -> Result<CompletionAttestation, sqlx::Error> {
        Ok(CompletionAttestation {
            task_id: self.task_id,
            system_id: SystemId::from_uuid(self.system_id),
            completed_by: actor("completed_by", self.completed_by)?,
            completed_at: Timestamp::from_datetime(self.completed_at),
            evidence_link: self.evidence_link,
            attested_state: self.attested_state,
        })
    }
}
