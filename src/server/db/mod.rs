//! Database access layer using sqlx with PostgreSQL.
//!
//! All contended state transitions (claims, call status, counters) are
//! expressed as single conditional statements so concurrent writers resolve
//! in the database, never in application memory.

pub mod organizations;
pub mod agents;
pub mod calls;
pub mod claims;
pub mod presence;
pub mod parked_calls;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Initialize the database connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
