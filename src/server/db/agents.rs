//! Agent availability registry operations.

use crate::models::Agent;
use sqlx::PgPool;
use uuid::Uuid;

const AGENT_COLUMNS: &str = r#"
    id, organization_id, name, role, is_available,
    today_inbound_calls, today_outbound_calls,
    weekly_inbound_calls, weekly_outbound_calls,
    monthly_inbound_calls, monthly_outbound_calls,
    yearly_inbound_calls, yearly_outbound_calls,
    last_count_reset_date, last_week_reset_date,
    last_month_reset_date, last_year_reset_date,
    created_at
"#;

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Agent>, sqlx::Error> {
    sqlx::query_as::<_, Agent>(&format!(
        "SELECT {AGENT_COLUMNS} FROM voip_users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Every agent in the organization eligible for ring fanout right now.
pub async fn get_available(pool: &PgPool, organization_id: Uuid) -> Result<Vec<Agent>, sqlx::Error> {
    sqlx::query_as::<_, Agent>(&format!(
        r#"
        SELECT {AGENT_COLUMNS}
        FROM voip_users
        WHERE organization_id = $1
          AND is_available
          AND role IN ('agent', 'admin')
        ORDER BY name
        "#
    ))
    .bind(organization_id)
    .fetch_all(pool)
    .await
}

pub async fn set_availability(
    pool: &PgPool,
    id: Uuid,
    available: bool,
) -> Result<Option<Agent>, sqlx::Error> {
    sqlx::query_as::<_, Agent>(&format!(
        r#"
        UPDATE voip_users
        SET is_available = $2
        WHERE id = $1
        RETURNING {AGENT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(available)
    .fetch_optional(pool)
    .await
}
