//! Presence rows and the ring-event signal log.
//!
//! Both tables are the fast, non-critical tier: callers treat write failures
//! as degraded signal, not operation failure, because the durable call row
//! stays authoritative.

use crate::models::{ActiveCallPresence, PresenceStatus, RingEvent, RingEventType};
use sqlx::PgPool;
use uuid::Uuid;

const PRESENCE_COLUMNS: &str = "id, call_sid, agent_id, caller_number, status, created_at";
const EVENT_COLUMNS: &str = "id, call_sid, agent_id, event_type, created_at";

pub async fn insert_ringing(
    pool: &PgPool,
    call_sid: &str,
    agent_id: Uuid,
    caller_number: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO active_calls (call_sid, agent_id, caller_number, status)
        VALUES ($1, $2, $3, 'ringing')
        ON CONFLICT (call_sid, agent_id) DO NOTHING
        "#,
    )
    .bind(call_sid)
    .bind(agent_id)
    .bind(caller_number)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(
    pool: &PgPool,
    call_sid: &str,
    agent_id: Uuid,
    status: PresenceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE active_calls SET status = $3 WHERE call_sid = $1 AND agent_id = $2")
        .bind(call_sid)
        .bind(agent_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Flips every presence row for a call, whichever agents hold one.
pub async fn set_status_all(
    pool: &PgPool,
    call_sid: &str,
    status: PresenceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE active_calls SET status = $2 WHERE call_sid = $1")
        .bind(call_sid)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Removes every presence row for a call, returning the agents whose
/// screens were still armed so the caller can signal them.
pub async fn delete_for_call(pool: &PgPool, call_sid: &str) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("DELETE FROM active_calls WHERE call_sid = $1 RETURNING agent_id")
            .bind(call_sid)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Removes presence rows for every agent that lost the claim race.
pub async fn delete_except(
    pool: &PgPool,
    call_sid: &str,
    winner: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "DELETE FROM active_calls WHERE call_sid = $1 AND agent_id <> $2 RETURNING agent_id",
    )
    .bind(call_sid)
    .bind(winner)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn get_for_agent(
    pool: &PgPool,
    agent_id: Uuid,
) -> Result<Vec<ActiveCallPresence>, sqlx::Error> {
    sqlx::query_as::<_, ActiveCallPresence>(&format!(
        "SELECT {PRESENCE_COLUMNS} FROM active_calls WHERE agent_id = $1 ORDER BY created_at"
    ))
    .bind(agent_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_event(
    pool: &PgPool,
    call_sid: &str,
    agent_id: Uuid,
    event_type: RingEventType,
) -> Result<RingEvent, sqlx::Error> {
    sqlx::query_as::<_, RingEvent>(&format!(
        r#"
        INSERT INTO ring_events (call_sid, agent_id, event_type)
        VALUES ($1, $2, $3)
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(call_sid)
    .bind(agent_id)
    .bind(event_type)
    .fetch_one(pool)
    .await
}

/// Events for one agent newer than the poll cursor, oldest first.
pub async fn events_after(
    pool: &PgPool,
    agent_id: Uuid,
    after: i64,
    limit: i64,
) -> Result<Vec<RingEvent>, sqlx::Error> {
    sqlx::query_as::<_, RingEvent>(&format!(
        r#"
        SELECT {EVENT_COLUMNS}
        FROM ring_events
        WHERE agent_id = $1 AND id > $2
        ORDER BY id
        LIMIT $3
        "#
    ))
    .bind(agent_id)
    .bind(after)
    .bind(limit)
    .fetch_all(pool)
    .await
}
