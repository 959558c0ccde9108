//! Diesel-based archive repository for SQLite.
//!
//! Every read and delete is scoped to an owner; another owner's id behaves
//! exactly like a missing one.

use diesel::prelude::*;

use super::diesel_models::{ArchiveRow, NewArchive};
use super::diesel_pool::{run_blocking, DieselError, SqlitePool};
use super::{format_datetime, parse_datetime};
use crate::models::ArchiveRecord;
use crate::schema::archives;

/// Convert a database record to a domain model.
impl From<ArchiveRow> for ArchiveRecord {
    fn from(row: ArchiveRow) -> Self {
        ArchiveRecord {
            id: row.id,
            file_name: row.file_name,
            owner_id: row.owner_id,
            file_size: row.file_size.max(0) as u64,
            source_url: row.source_url,
            created_at: parse_datetime(&row.created_at),
            from_schedule: row.from_schedule,
        }
    }
}

/// Diesel-based archive repository with compile-time query checking.
#[derive(Clone)]
pub struct DieselArchiveRepository {
    pool: SqlitePool,
}

impl DieselArchiveRepository {
    /// Create a new Diesel archive repository with an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new archive record.
    pub async fn insert(&self, record: &ArchiveRecord) -> Result<(), DieselError> {
        let record = record.clone();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let created_at = format_datetime(&record.created_at);
            let new_archive = NewArchive {
                id: &record.id,
                file_name: &record.file_name,
                owner_id: &record.owner_id,
                file_size: record.file_size as i64,
                source_url: &record.source_url,
                created_at: &created_at,
                from_schedule: record.from_schedule.as_deref(),
            };
            diesel::insert_into(archives::table)
                .values(&new_archive)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Get an archive owned by `owner_id`.
    pub async fn get_for_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<ArchiveRecord>, DieselError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            archives::table
                .filter(archives::id.eq(&id))
                .filter(archives::owner_id.eq(&owner_id))
                .first::<ArchiveRow>(conn)
                .optional()
        })
        .await
        .map(|opt| opt.map(ArchiveRecord::from))
    }

    /// One page of an owner's archives, newest first. Pages start at 0.
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ArchiveRecord>, DieselError> {
        let owner_id = owner_id.to_string();
        let limit = per_page as i64;
        let offset = page as i64 * per_page as i64;
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            archives::table
                .filter(archives::owner_id.eq(&owner_id))
                .order((archives::created_at.desc(), archives::id.desc()))
                .limit(limit)
                .offset(offset)
                .load::<ArchiveRow>(conn)
        })
        .await
        .map(|rows| rows.into_iter().map(ArchiveRecord::from).collect())
    }

    /// Count an owner's archives.
    pub async fn count_for_owner(&self, owner_id: &str) -> Result<u64, DieselError> {
        let owner_id = owner_id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            use diesel::dsl::count_star;
            let count: i64 = archives::table
                .filter(archives::owner_id.eq(&owner_id))
                .select(count_star())
                .first(conn)?;
            Ok(count as u64)
        })
        .await
    }

    /// Delete an owner's archive, returning the removed record.
    pub async fn delete_for_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<ArchiveRecord>, DieselError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            conn.transaction(|conn| {
                let row = archives::table
                    .filter(archives::id.eq(&id))
                    .filter(archives::owner_id.eq(&owner_id))
                    .first::<ArchiveRow>(conn)
                    .optional()?;
                if row.is_some() {
                    diesel::delete(archives::table.find(&id)).execute(conn)?;
                }
                Ok(row)
            })
        })
        .await
        .map(|opt| opt.map(ArchiveRecord::from))
    }
}
