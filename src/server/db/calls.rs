//! Call ledger operations.
//!
//! Rows are never deleted; terminal statuses are history. Transitions with
//! concurrent writers (claim assignment, terminal reconciliation) are
//! conditional updates keyed on the expected prior state.

use crate::models::{Call, CallStatus};
use sqlx::PgPool;
use uuid::Uuid;

const CALL_COLUMNS: &str = r#"
    id, organization_id, direction, status, from_number, to_number,
    twilio_call_sid, assigned_to, answered_by,
    created_at, answered_at, ended_at, duration_seconds,
    voicemail_transcription
"#;

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(&format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_sid(pool: &PgPool, call_sid: &str) -> Result<Option<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(&format!(
        "SELECT {CALL_COLUMNS} FROM calls WHERE twilio_call_sid = $1"
    ))
    .bind(call_sid)
    .fetch_optional(pool)
    .await
}

/// Creates the ledger row for an inbound call entering ring fanout.
/// Idempotent against webhook redelivery: the conflict target is the
/// one-row-per-SID invariant, and a replay returns the existing row.
pub async fn create_inbound(
    pool: &PgPool,
    organization_id: Uuid,
    from_number: &str,
    to_number: &str,
    call_sid: &str,
) -> Result<Call, sqlx::Error> {
    let inserted = sqlx::query_as::<_, Call>(&format!(
        r#"
        INSERT INTO calls (organization_id, direction, status, from_number, to_number, twilio_call_sid)
        VALUES ($1, 'inbound', 'ringing', $2, $3, $4)
        ON CONFLICT (twilio_call_sid) DO NOTHING
        RETURNING {CALL_COLUMNS}
        "#
    ))
    .bind(organization_id)
    .bind(from_number)
    .bind(to_number)
    .bind(call_sid)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(call) => Ok(call),
        None => get_by_sid(pool, call_sid)
            .await?
            .ok_or(sqlx::Error::RowNotFound),
    }
}

/// Creates the ledger row for an agent-originated outbound call.
pub async fn create_outbound(
    pool: &PgPool,
    organization_id: Uuid,
    agent_id: Uuid,
    from_number: &str,
    to_number: &str,
    call_sid: &str,
) -> Result<Call, sqlx::Error> {
    let inserted = sqlx::query_as::<_, Call>(&format!(
        r#"
        INSERT INTO calls (organization_id, direction, status, from_number, to_number, twilio_call_sid, assigned_to)
        VALUES ($1, 'outbound', 'ringing', $2, $3, $4, $5)
        ON CONFLICT (twilio_call_sid) DO NOTHING
        RETURNING {CALL_COLUMNS}
        "#
    ))
    .bind(organization_id)
    .bind(from_number)
    .bind(to_number)
    .bind(call_sid)
    .bind(agent_id)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(call) => Ok(call),
        None => get_by_sid(pool, call_sid)
            .await?
            .ok_or(sqlx::Error::RowNotFound),
    }
}

/// Assigns the call to the claim winner. Returns `None` when the call has
/// already left the ringing phase, so a raced assignment cannot overwrite a
/// terminal or transferred state.
pub async fn try_assign(
    pool: &PgPool,
    call_sid: &str,
    agent_id: Uuid,
) -> Result<Option<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(&format!(
        r#"
        UPDATE calls
        SET assigned_to = $2, answered_by = $2, status = 'in-progress', answered_at = NOW()
        WHERE twilio_call_sid = $1 AND status = 'ringing'
        RETURNING {CALL_COLUMNS}
        "#
    ))
    .bind(call_sid)
    .bind(agent_id)
    .fetch_optional(pool)
    .await
}

/// Reconciles a terminal dial outcome. Returns `None` when the call is
/// already terminal, which makes duplicate provider callbacks a silent
/// no-op.
pub async fn finish(
    pool: &PgPool,
    call_sid: &str,
    status: CallStatus,
) -> Result<Option<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(&format!(
        r#"
        UPDATE calls
        SET status = $2,
            ended_at = NOW(),
            duration_seconds = EXTRACT(EPOCH FROM (NOW() - COALESCE(answered_at, created_at)))::int
        WHERE twilio_call_sid = $1
          AND status NOT IN ('completed', 'no-answer', 'busy', 'canceled', 'failed')
        RETURNING {CALL_COLUMNS}
        "#
    ))
    .bind(call_sid)
    .bind(status)
    .fetch_optional(pool)
    .await
}

pub async fn update_status(pool: &PgPool, id: Uuid, status: CallStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE calls SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hands the call to a new agent after a confirmed unpark redirect.
pub async fn reassign(pool: &PgPool, id: Uuid, agent_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE calls SET assigned_to = $2, status = 'in-progress' WHERE id = $1")
        .bind(id)
        .bind(agent_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_transcription(
    pool: &PgPool,
    call_sid: &str,
    transcription: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE calls SET voicemail_transcription = $2 WHERE twilio_call_sid = $1",
    )
    .bind(call_sid)
    .bind(transcription)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get_recent(pool: &PgPool, limit: i64) -> Result<Vec<Call>, sqlx::Error> {
    sqlx::query_as::<_, Call>(&format!(
        r#"
        SELECT {CALL_COLUMNS}
        FROM calls
        ORDER BY created_at DESC
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}
