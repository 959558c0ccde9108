//! Diesel-based scheduled job repository for SQLite.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::diesel_models::{NewScheduledJob, ScheduledJobRow};
use super::diesel_pool::{run_blocking, DieselError, SqlitePool};
use super::{format_datetime, parse_datetime, parse_datetime_opt};
use crate::models::{CrawlSettings, ScheduleCadence, ScheduledJob};
use crate::schema::scheduled_jobs;

fn row_to_job(row: ScheduledJobRow) -> Result<ScheduledJob, DieselError> {
    let settings: CrawlSettings = serde_json::from_str(&row.settings)
        .map_err(|e| DieselError::DeserializationError(Box::new(e)))?;
    let cadence = ScheduleCadence::from_str(&row.cadence).ok_or_else(|| {
        DieselError::DeserializationError(
            format!("unknown cadence '{}' for schedule {}", row.cadence, row.id).into(),
        )
    })?;

    Ok(ScheduledJob {
        id: row.id,
        owner_id: row.owner_id,
        email: row.email,
        settings,
        cadence,
        paused: row.paused != 0,
        next_run_at: parse_datetime(&row.next_run_at),
        last_run_at: parse_datetime_opt(row.last_run_at),
        created_at: parse_datetime(&row.created_at),
    })
}

fn rows_to_jobs(rows: Vec<ScheduledJobRow>) -> Result<Vec<ScheduledJob>, DieselError> {
    rows.into_iter().map(row_to_job).collect()
}

/// Diesel-based scheduled job repository.
#[derive(Clone)]
pub struct DieselScheduleRepository {
    pool: SqlitePool,
}

impl DieselScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a scheduled job.
    ///
    /// Only for new schedules. Changes to a stored schedule go through the
    /// targeted updates below so they never bring back a deleted row.
    pub async fn save(&self, job: &ScheduledJob) -> Result<(), DieselError> {
        let settings_json = serde_json::to_string(&job.settings)
            .map_err(|e| DieselError::SerializationError(Box::new(e)))?;
        let job = job.clone();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let next_run_at = format_datetime(&job.next_run_at);
            let last_run_at = job.last_run_at.as_ref().map(format_datetime);
            let created_at = format_datetime(&job.created_at);
            let row = NewScheduledJob {
                id: &job.id,
                owner_id: &job.owner_id,
                email: &job.email,
                setting_type: job.settings.setting_type().as_str(),
                settings: &settings_json,
                cadence: job.cadence.as_str(),
                paused: job.paused as i32,
                next_run_at: &next_run_at,
                last_run_at: last_run_at.as_deref(),
                created_at: &created_at,
            };

            // Use replace_into for SQLite upsert
            diesel::replace_into(scheduled_jobs::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Store new settings, email and cadence for an owner's schedule.
    ///
    /// `next_run_at` is only written when `retimed` is set. Returns whether
    /// the schedule still exists.
    pub async fn update_for_owner(&self, job: &ScheduledJob, retimed: bool) -> Result<bool, DieselError> {
        let settings_json = serde_json::to_string(&job.settings)
            .map_err(|e| DieselError::SerializationError(Box::new(e)))?;
        let job = job.clone();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let target = scheduled_jobs::table
                .filter(scheduled_jobs::id.eq(&job.id))
                .filter(scheduled_jobs::owner_id.eq(&job.owner_id));
            let setting_type = job.settings.setting_type().as_str();
            let rows = if retimed {
                diesel::update(target)
                    .set((
                        scheduled_jobs::email.eq(&job.email),
                        scheduled_jobs::setting_type.eq(setting_type),
                        scheduled_jobs::settings.eq(&settings_json),
                        scheduled_jobs::cadence.eq(job.cadence.as_str()),
                        scheduled_jobs::next_run_at.eq(format_datetime(&job.next_run_at)),
                    ))
                    .execute(conn)?
            } else {
                diesel::update(target)
                    .set((
                        scheduled_jobs::email.eq(&job.email),
                        scheduled_jobs::setting_type.eq(setting_type),
                        scheduled_jobs::settings.eq(&settings_json),
                        scheduled_jobs::cadence.eq(job.cadence.as_str()),
                    ))
                    .execute(conn)?
            };
            Ok(rows == 1)
        })
        .await
    }

    /// Pause an owner's schedule. Returns whether the schedule exists.
    pub async fn pause_for_owner(&self, id: &str, owner_id: &str) -> Result<bool, DieselError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let rows = diesel::update(
                scheduled_jobs::table
                    .filter(scheduled_jobs::id.eq(&id))
                    .filter(scheduled_jobs::owner_id.eq(&owner_id)),
            )
            .set(scheduled_jobs::paused.eq(1))
            .execute(conn)?;
            Ok(rows == 1)
        })
        .await
    }

    /// Unpause an owner's paused schedule with its new next run time.
    ///
    /// Returns false when the schedule is gone or no longer paused.
    pub async fn resume_for_owner(
        &self,
        id: &str,
        owner_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let next_run_at = format_datetime(&next_run_at);
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let rows = diesel::update(
                scheduled_jobs::table
                    .filter(scheduled_jobs::id.eq(&id))
                    .filter(scheduled_jobs::owner_id.eq(&owner_id))
                    .filter(scheduled_jobs::paused.eq(1)),
            )
            .set((
                scheduled_jobs::paused.eq(0),
                scheduled_jobs::next_run_at.eq(&next_run_at),
            ))
            .execute(conn)?;
            Ok(rows == 1)
        })
        .await
    }

    /// Record a trigger of `job`, which was found due at `due_at`.
    ///
    /// Writes only `next_run_at` and `last_run_at`, and only while the row is
    /// still unpaused and still due at `due_at`. Returns whether this caller
    /// claimed the run; false means the schedule was deleted, paused or
    /// already triggered in the meantime.
    pub async fn claim_run(&self, job: &ScheduledJob, due_at: DateTime<Utc>) -> Result<bool, DieselError> {
        let id = job.id.clone();
        let due_at = format_datetime(&due_at);
        let next_run_at = format_datetime(&job.next_run_at);
        let last_run_at = job.last_run_at.as_ref().map(format_datetime);
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let rows = diesel::update(
                scheduled_jobs::table
                    .filter(scheduled_jobs::id.eq(&id))
                    .filter(scheduled_jobs::paused.eq(0))
                    .filter(scheduled_jobs::next_run_at.eq(&due_at)),
            )
            .set((
                scheduled_jobs::next_run_at.eq(&next_run_at),
                scheduled_jobs::last_run_at.eq(last_run_at.as_deref()),
            ))
            .execute(conn)?;
            Ok(rows == 1)
        })
        .await
    }

    /// Get a scheduled job owned by `owner_id`.
    pub async fn get_for_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<ScheduledJob>, DieselError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let pool = self.pool.clone();

        let row = run_blocking(pool, move |conn| {
            scheduled_jobs::table
                .filter(scheduled_jobs::id.eq(&id))
                .filter(scheduled_jobs::owner_id.eq(&owner_id))
                .first::<ScheduledJobRow>(conn)
                .optional()
        })
        .await?;

        row.map(row_to_job).transpose()
    }

    /// One page of an owner's schedules, newest first. Pages start at 0.
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ScheduledJob>, DieselError> {
        let owner_id = owner_id.to_string();
        let limit = per_page as i64;
        let offset = page as i64 * per_page as i64;
        let pool = self.pool.clone();

        let rows = run_blocking(pool, move |conn| {
            scheduled_jobs::table
                .filter(scheduled_jobs::owner_id.eq(&owner_id))
                .order((scheduled_jobs::created_at.desc(), scheduled_jobs::id.desc()))
                .limit(limit)
                .offset(offset)
                .load::<ScheduledJobRow>(conn)
        })
        .await?;

        rows_to_jobs(rows)
    }

    /// Unpaused jobs whose next run is at or before `now`, oldest first.
    pub async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, DieselError> {
        let now = format_datetime(&now);
        let pool = self.pool.clone();

        let rows = run_blocking(pool, move |conn| {
            scheduled_jobs::table
                .filter(scheduled_jobs::paused.eq(0))
                .filter(scheduled_jobs::next_run_at.le(&now))
                .order(scheduled_jobs::next_run_at.asc())
                .load::<ScheduledJobRow>(conn)
        })
        .await?;

        rows_to_jobs(rows)
    }

    /// Delete an owner's scheduled job. Returns whether a row was removed.
    pub async fn delete_for_owner(&self, id: &str, owner_id: &str) -> Result<bool, DieselError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let rows = diesel::delete(
                scheduled_jobs::table
                    .filter(scheduled_jobs::id.eq(&id))
                    .filter(scheduled_jobs::owner_id.eq(&owner_id)),
            )
            .execute(conn)?;
            Ok(rows > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RobotsPolicy, StandardSettings};
    use crate::repository::test_support::setup_test_db;
    use chrono::Duration;

    fn schedule(owner: &str) -> ScheduledJob {
        ScheduledJob::new(
            owner.to_string(),
            format!("{}@example.org", owner),
            CrawlSettings::Standard(StandardSettings {
                url: "https://example.com".to_string(),
                include_domains: vec!["example.com".to_string()],
                exclude_paths: vec!["/private".to_string()],
                robots: RobotsPolicy::Files,
                structure: 0,
            }),
            ScheduleCadence::Daily,
        )
    }

    #[tokio::test]
    async fn test_schedule_crud() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselScheduleRepository::new(pool);

        let mut job = schedule("alice");
        repo.save(&job).await.unwrap();

        let fetched = repo.get_for_owner(&job.id, "alice").await.unwrap().unwrap();
        assert_eq!(fetched.settings, job.settings);
        assert_eq!(fetched.cadence, ScheduleCadence::Daily);
        assert!(repo.get_for_owner(&job.id, "bob").await.unwrap().is_none());

        job.cadence = ScheduleCadence::Monthly;
        assert!(repo.update_for_owner(&job, false).await.unwrap());
        assert!(repo.pause_for_owner(&job.id, "alice").await.unwrap());
        assert!(!repo.pause_for_owner(&job.id, "bob").await.unwrap());
        let fetched = repo.get_for_owner(&job.id, "alice").await.unwrap().unwrap();
        assert!(fetched.paused);
        assert_eq!(fetched.cadence, ScheduleCadence::Monthly);
        assert_eq!(
            fetched.next_run_at.timestamp_micros(),
            job.next_run_at.timestamp_micros()
        );
        assert_eq!(repo.list_for_owner("alice", 0, 10).await.unwrap().len(), 1);

        assert!(!repo.delete_for_owner(&job.id, "bob").await.unwrap());
        assert!(repo.delete_for_owner(&job.id, "alice").await.unwrap());
        assert!(repo.get_for_owner(&job.id, "alice").await.unwrap().is_none());

        // Changes to a deleted schedule do not recreate it.
        assert!(!repo.update_for_owner(&job, true).await.unwrap());
        assert!(!repo.resume_for_owner(&job.id, "alice", Utc::now()).await.unwrap());
        assert!(repo.get_for_owner(&job.id, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_run_only_once() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselScheduleRepository::new(pool);
        let job = schedule("alice");
        repo.save(&job).await.unwrap();

        let now = Utc::now() + Duration::seconds(1);
        let mut first = repo.find_due(now).await.unwrap().remove(0);
        let mut second = first.clone();
        let due_at = first.next_run_at;

        first.mark_triggered(now);
        assert!(repo.claim_run(&first, due_at).await.unwrap());
        second.mark_triggered(now);
        assert!(!repo.claim_run(&second, due_at).await.unwrap());

        let stored = repo.get_for_owner(&job.id, "alice").await.unwrap().unwrap();
        assert_eq!(
            stored.next_run_at.timestamp_micros(),
            first.next_run_at.timestamp_micros()
        );
        assert!(stored.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_claim_run_after_delete_or_pause() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselScheduleRepository::new(pool);
        let deleted = schedule("alice");
        let paused = schedule("alice");
        repo.save(&deleted).await.unwrap();
        repo.save(&paused).await.unwrap();

        let now = Utc::now() + Duration::seconds(1);
        let due = repo.find_due(now).await.unwrap();
        assert_eq!(due.len(), 2);

        assert!(repo.delete_for_owner(&deleted.id, "alice").await.unwrap());
        assert!(repo.pause_for_owner(&paused.id, "alice").await.unwrap());

        for mut job in due {
            let due_at = job.next_run_at;
            job.mark_triggered(now);
            assert!(!repo.claim_run(&job, due_at).await.unwrap());
        }

        assert!(repo.get_for_owner(&deleted.id, "alice").await.unwrap().is_none());
        let stored = repo.get_for_owner(&paused.id, "alice").await.unwrap().unwrap();
        assert!(stored.paused);
        assert!(stored.last_run_at.is_none());
    }

    #[tokio::test]
    async fn test_find_due_skips_paused_and_future() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselScheduleRepository::new(pool);
        let now = Utc::now();

        let due = schedule("alice");
        let mut paused = schedule("alice");
        paused.paused = true;
        let mut future = schedule("bob");
        future.next_run_at = now + Duration::hours(2);

        for job in [&due, &paused, &future] {
            repo.save(job).await.unwrap();
        }

        let found = repo.find_due(now + Duration::seconds(1)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }
}
