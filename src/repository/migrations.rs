//! Schema creation.
//!
//! Statements are idempotent and run on every startup.

use diesel::connection::SimpleConnection;
use diesel::SqliteConnection;

use super::diesel_pool::{run_blocking, DieselError, SqlitePool};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS archives (
    id TEXT PRIMARY KEY NOT NULL,
    file_name TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    file_size BIGINT NOT NULL,
    source_url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    from_schedule TEXT
);
CREATE INDEX IF NOT EXISTS idx_archives_owner_created
    ON archives (owner_id, created_at DESC);

CREATE TABLE IF NOT EXISTS scheduled_jobs (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    email TEXT NOT NULL,
    setting_type TEXT NOT NULL,
    settings TEXT NOT NULL,
    cadence TEXT NOT NULL,
    paused INTEGER NOT NULL DEFAULT 0,
    next_run_at TEXT NOT NULL,
    last_run_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scheduled_jobs_owner_created
    ON scheduled_jobs (owner_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_scheduled_jobs_due
    ON scheduled_jobs (paused, next_run_at);
"#;

/// Create all tables and indexes on one connection.
pub fn create_schema(conn: &mut SqliteConnection) -> Result<(), DieselError> {
    conn.batch_execute(SCHEMA)
}

/// Create all tables and indexes using a pooled connection.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DieselError> {
    run_blocking(pool.clone(), create_schema).await
}
