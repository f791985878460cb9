//! # Database Persistence Layer
//!
//! Postgres persistence for the compliance records via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! mutation is written through to Postgres after it succeeds in memory and
//! the in-memory stores are hydrated on startup. When absent, the API runs
//! in-memory only.
//!
//! Updates of versioned rows are conditional on the previously stored
//! version (`WHERE revision = $n`). Zero affected rows means another writer
//! got there first; callers surface that as a retryable conflict.
//!
//! Closed enums are stored as their `snake_case` wire names. Reading a value
//! the enum does not know is a decode error, never a silent default.

pub mod assessments;
pub mod completions;
pub mod documents;
pub mod policies;
pub mod systems;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

// -- Column codecs ------------------------------------------------------------

fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// Serialize a closed enum to the wire name stored in a text column.
pub(crate) fn enum_to_text<T: Serialize + std::fmt::Debug>(
    value: &T,
) -> Result<String, sqlx::Error> {
    let json = serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, value = ?value, "failed to serialize enum column");
        sqlx::Error::Encode(Box::new(e))
    })?;
    json.as_str().map(String::from).ok_or_else(|| {
        tracing::error!(value = ?value, "enum did not serialize to a JSON string");
        sqlx::Error::Encode(invalid_data(format!("{value:?} is not a string enum")))
    })
}

/// Parse a text column back into a closed enum.
pub(crate) fn text_to_enum<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|e| {
        tracing::error!(column, value = raw, error = %e, "unknown enum value in database");
        sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        }
    })
}

/// Serialize a nested value for a JSONB column.
pub(crate) fn to_json<T: Serialize>(
    column: &str,
    value: &T,
) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(column, error = %e, "failed to serialize JSONB column");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Parse a JSONB column.
pub(crate) fn from_json<T: DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> Result<T, sqlx::Error> {
    serde_json::from_value(value).map_err(|e| {
        tracing::error!(column, error = %e, "malformed JSONB column in database");
        sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        }
    })
}

/// Postgres has no unsigned integers.
pub(crate) fn to_i64(column: &str, value: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| {
        sqlx::Error::Encode(invalid_data(format!("{column} out of range: {e}")))
    })
}

pub(crate) fn from_i64(column: &str, value: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Parse a stored actor id.
pub(crate) fn actor(column: &str, raw: String) -> Result<acr_core::ActorId, sqlx::Error> {
    acr_core::ActorId::new(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use acr_core::{ComplianceStatus, RiskLevel};

    #[test]
    fn enums_round_trip_through_text() {
        assert_eq!(
            enum_to_text(&ComplianceStatus::PartiallyCompliant).unwrap(),
            "partially_compliant"
        );
        let level: RiskLevel = text_to_enum("risk_level", "high").unwrap();
        assert_eq!(level, RiskLevel::High);
    }

    #[test]
    fn unknown_enum_value_is_a_decode_error() {
        let err = text_to_enum::<RiskLevel>("risk_level", "catastrophic").unwrap_err();
        assert!(matches!(
            err,
            sqlx::Error::ColumnDecode { ref index, .. } if index == "risk_level"
        ));
    }

    #[test]
    fn negative_versions_are_rejected() {
        assert!(from_i64("system_version", -1).is_err());
        assert_eq!(from_i64("system_version", 7).unwrap(), 7);
        assert!(to_i64("system_version", u64::MAX).is_err());
    }

    #[test]
    fn malformed_actor_is_a_decode_error() {
        assert!(actor("assessed_by", "bad actor".to_string()).is_err());
    }
}
