//! Persistence for archive records and scheduled jobs.

pub mod diesel_archive;
pub mod diesel_models;
pub mod diesel_pool;
pub mod diesel_schedule;
pub mod migrations;

pub use diesel_archive::DieselArchiveRepository;
pub use diesel_pool::{create_diesel_pool, run_blocking, DieselError, SqlitePool};
pub use diesel_schedule::DieselScheduleRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Serialize a timestamp as fixed-width RFC 3339 so text order is time order.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, falling back to the Unix epoch.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

/// Open the pool and make sure the schema exists.
pub async fn open(db_path: &std::path::Path) -> anyhow::Result<SqlitePool> {
    let pool = create_diesel_pool(db_path)?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::diesel_pool::create_diesel_pool_from_url;
    use super::*;
    use tempfile::tempdir;

    /// Fresh database with the full schema in a temporary directory.
    pub async fn setup_test_db() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db_url = format!("{}", db_path.display());

        let pool = create_diesel_pool_from_url(&db_url).unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        (pool, dir)
    }
}
