//! Parked call operations.
//!
//! Rows are deleted only after the provider confirms the leg left the hold
//! conference; a row for a failed transfer stays behind for retry.

use crate::models::ParkedCall;
use sqlx::PgPool;
use uuid::Uuid;

const PARKED_COLUMNS: &str =
    "id, conference_sid, participant_sid, caller_number, call_id, metadata, created_at";

pub async fn create(
    pool: &PgPool,
    conference_sid: &str,
    participant_sid: &str,
    caller_number: &str,
    call_id: Option<Uuid>,
    metadata: serde_json::Value,
) -> Result<ParkedCall, sqlx::Error> {
    sqlx::query_as::<_, ParkedCall>(&format!(
        r#"
        INSERT INTO parked_calls (conference_sid, participant_sid, caller_number, call_id, metadata)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PARKED_COLUMNS}
        "#
    ))
    .bind(conference_sid)
    .bind(participant_sid)
    .bind(caller_number)
    .bind(call_id)
    .bind(metadata)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ParkedCall>, sqlx::Error> {
    sqlx::query_as::<_, ParkedCall>(&format!(
        "SELECT {PARKED_COLUMNS} FROM parked_calls WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<ParkedCall>, sqlx::Error> {
    sqlx::query_as::<_, ParkedCall>(&format!(
        "SELECT {PARKED_COLUMNS} FROM parked_calls ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM parked_calls WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
