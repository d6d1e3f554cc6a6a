//! Call claim operations: the idempotency guard for the answer race.

use crate::models::CallClaim;
use sqlx::PgPool;
use uuid::Uuid;

const CLAIM_COLUMNS: &str = "id, call_sid, status, claimed_by, created_at";

/// Creates the pending claim alongside the call row. Webhook redelivery
/// hits the unique SID and is a no-op.
pub async fn create(pool: &PgPool, call_sid: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO call_claims (call_sid, status)
        VALUES ($1, 'pending')
        ON CONFLICT (call_sid) DO NOTHING
        "#,
    )
    .bind(call_sid)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_sid(pool: &PgPool, call_sid: &str) -> Result<Option<CallClaim>, sqlx::Error> {
    sqlx::query_as::<_, CallClaim>(&format!(
        "SELECT {CLAIM_COLUMNS} FROM call_claims WHERE call_sid = $1"
    ))
    .bind(call_sid)
    .fetch_optional(pool)
    .await
}

/// First-writer-wins claim transition. The conditional update is the whole
/// race: exactly one concurrent caller gets the row back, everyone else
/// gets `None`.
pub async fn try_claim(
    pool: &PgPool,
    call_sid: &str,
    agent_id: Uuid,
) -> Result<Option<CallClaim>, sqlx::Error> {
    sqlx::query_as::<_, CallClaim>(&format!(
        r#"
        UPDATE call_claims
        SET status = 'claimed', claimed_by = $2
        WHERE call_sid = $1 AND status = 'pending'
        RETURNING {CLAIM_COLUMNS}
        "#
    ))
    .bind(call_sid)
    .bind(agent_id)
    .fetch_optional(pool)
    .await
}

/// Expires a claim nobody won before the dial timed out.
pub async fn expire_pending(pool: &PgPool, call_sid: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE call_claims SET status = 'expired' WHERE call_sid = $1 AND status = 'pending'",
    )
    .bind(call_sid)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
