//! Diesel ORM models for database tables.
//!
//! These models provide compile-time type checking for database operations.
//! SQLite operations are wrapped in spawn_blocking via `run_blocking`.

use diesel::prelude::*;

use crate::schema;

/// Archive record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::archives)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArchiveRow {
    pub id: String,
    pub file_name: String,
    pub owner_id: String,
    pub file_size: i64,
    pub source_url: String,
    pub created_at: String,
    pub from_schedule: Option<String>,
}

/// New archive for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::archives)]
pub struct NewArchive<'a> {
    pub id: &'a str,
    pub file_name: &'a str,
    pub owner_id: &'a str,
    pub file_size: i64,
    pub source_url: &'a str,
    pub created_at: &'a str,
    pub from_schedule: Option<&'a str>,
}

/// Scheduled job record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scheduled_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScheduledJobRow {
    pub id: String,
    pub owner_id: String,
    pub email: String,
    pub setting_type: String,
    pub settings: String,
    pub cadence: String,
    pub paused: i32,
    pub next_run_at: String,
    pub last_run_at: Option<String>,
    pub created_at: String,
}

/// New or replacement scheduled job.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scheduled_jobs)]
pub struct NewScheduledJob<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub email: &'a str,
    pub setting_type: &'a str,
    pub settings: &'a str,
    pub cadence: &'a str,
    pub paused: i32,
    pub next_run_at: &'a str,
    pub last_run_at: Option<&'a str>,
    pub created_at: &'a str,
}
