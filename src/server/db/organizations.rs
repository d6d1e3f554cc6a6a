//! Organization directory operations. Read-only to the core.

use crate::models::Organization;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
    sqlx::query_as::<_, Organization>(
        r#"
        SELECT id, name, twilio_number, created_at
        FROM organizations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Resolves the organization that owns an inbound destination number.
pub async fn get_by_number(pool: &PgPool, number: &str) -> Result<Option<Organization>, sqlx::Error> {
    sqlx::query_as::<_, Organization>(
        r#"
        SELECT id, name, twilio_number, created_at
        FROM organizations
        WHERE twilio_number = $1
        "#,
    )
    .bind(number)
    .fetch_optional(pool)
    .await
}
