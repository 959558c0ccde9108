//! Management of recurring archive jobs.

use chrono::Utc;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{ScheduleCadence, ScheduledJob, ValidatedRequest};
use crate::repository::DieselScheduleRepository;

/// Schedules shown per listing page.
pub const SCHEDULES_PER_PAGE: u32 = 10;

#[derive(Clone)]
pub struct ScheduleService {
    repo: DieselScheduleRepository,
}

impl ScheduleService {
    pub fn new(repo: DieselScheduleRepository) -> Self {
        Self { repo }
    }

    /// Store a new schedule. It becomes due on the next scheduler tick.
    pub async fn create(
        &self,
        owner_id: &str,
        request: ValidatedRequest,
        cadence: ScheduleCadence,
    ) -> ServiceResult<ScheduledJob> {
        let job = ScheduledJob::new(
            owner_id.to_string(),
            request.email,
            request.settings,
            cadence,
        );
        self.repo.save(&job).await?;
        info!(
            "Created {} schedule {} for {}",
            job.cadence.as_str(),
            job.id,
            job.settings.display_url()
        );
        Ok(job)
    }

    pub async fn list(&self, owner_id: &str, page: u32) -> ServiceResult<Vec<ScheduledJob>> {
        Ok(self
            .repo
            .list_for_owner(owner_id, page, SCHEDULES_PER_PAGE)
            .await?)
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> ServiceResult<ScheduledJob> {
        self.repo
            .get_for_owner(id, owner_id)
            .await?
            .ok_or_else(|| ServiceError::schedule_not_found(id))
    }

    /// Replace a schedule's settings, email and optionally its cadence.
    ///
    /// A cadence change re-times the next run from the last one; a schedule
    /// that never ran keeps its pending first run.
    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        request: ValidatedRequest,
    ) -> ServiceResult<ScheduledJob> {
        let mut job = self.get(owner_id, id).await?;
        job.settings = request.settings;
        job.email = request.email;

        let mut retimed = false;
        if let Some(cadence) = request.schedule {
            if cadence != job.cadence {
                job.cadence = cadence;
                if let Some(last) = job.last_run_at {
                    job.next_run_at = cadence.next_after(last);
                    retimed = true;
                }
            }
        }

        if !self.repo.update_for_owner(&job, retimed).await? {
            return Err(ServiceError::schedule_not_found(id));
        }
        info!("Updated schedule {}", job.id);
        self.get(owner_id, id).await
    }

    pub async fn pause(&self, owner_id: &str, id: &str) -> ServiceResult<ScheduledJob> {
        if !self.repo.pause_for_owner(id, owner_id).await? {
            return Err(ServiceError::schedule_not_found(id));
        }
        info!("Paused schedule {}", id);
        self.get(owner_id, id).await
    }

    /// Unpause. Runs missed while paused are skipped, not replayed.
    pub async fn resume(&self, owner_id: &str, id: &str) -> ServiceResult<ScheduledJob> {
        let mut job = self.get(owner_id, id).await?;
        if job.paused {
            job.resume(Utc::now());
            if self
                .repo
                .resume_for_owner(id, owner_id, job.next_run_at)
                .await?
            {
                info!("Resumed schedule {}, next run at {}", job.id, job.next_run_at);
            }
        }
        self.get(owner_id, id).await
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> ServiceResult<()> {
        if self.repo.delete_for_owner(id, owner_id).await? {
            info!("Deleted schedule {}", id);
            Ok(())
        } else {
            Err(ServiceError::schedule_not_found(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrawlSettings, RobotsPolicy, StandardSettings};
    use crate::repository::test_support::setup_test_db;
    use chrono::Duration;

    fn request(url: &str, schedule: Option<ScheduleCadence>) -> ValidatedRequest {
        ValidatedRequest {
            settings: CrawlSettings::Standard(StandardSettings {
                url: url.to_string(),
                include_domains: vec!["example.com".to_string()],
                exclude_paths: vec![],
                robots: RobotsPolicy::Ignore,
                structure: 0,
            }),
            email: "owner@example.org".to_string(),
            schedule,
        }
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (pool, _dir) = setup_test_db().await;
        let service = ScheduleService::new(DieselScheduleRepository::new(pool));

        let job = service
            .create("alice", request("https://example.com", None), ScheduleCadence::Daily)
            .await
            .unwrap();
        assert!(job.is_due(Utc::now()));

        let paused = service.pause("alice", &job.id).await.unwrap();
        assert!(paused.paused);
        assert!(!service.get("alice", &job.id).await.unwrap().is_due(Utc::now()));

        let resumed = service.resume("alice", &job.id).await.unwrap();
        assert!(!resumed.paused);
        // The missed immediate run is skipped.
        assert!(resumed.next_run_at > Utc::now() + Duration::hours(23));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (pool, _dir) = setup_test_db().await;
        let service = ScheduleService::new(DieselScheduleRepository::new(pool));

        let job = service
            .create("alice", request("https://example.com", None), ScheduleCadence::Daily)
            .await
            .unwrap();
        let updated = service
            .update(
                "alice",
                &job.id,
                request("https://example.com/news", Some(ScheduleCadence::Weekly)),
            )
            .await
            .unwrap();
        assert_eq!(updated.cadence, ScheduleCadence::Weekly);
        assert_eq!(updated.settings.display_url(), "https://example.com/news");
        assert_eq!(
            updated.next_run_at.timestamp_micros(),
            job.next_run_at.timestamp_micros()
        );

        assert!(matches!(
            service.delete("bob", &job.id).await,
            Err(ServiceError::NotFound(_))
        ));
        service.delete("alice", &job.id).await.unwrap();
        assert!(service.list("alice", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changes_to_deleted_schedule_are_not_found() {
        let (pool, _dir) = setup_test_db().await;
        let service = ScheduleService::new(DieselScheduleRepository::new(pool));

        let job = service
            .create("alice", request("https://example.com", None), ScheduleCadence::Daily)
            .await
            .unwrap();
        service.delete("alice", &job.id).await.unwrap();

        for result in [
            service.pause("alice", &job.id).await,
            service.resume("alice", &job.id).await,
            service
                .update("alice", &job.id, request("https://example.com/news", None))
                .await,
        ] {
            assert!(matches!(result, Err(ServiceError::NotFound(_))));
        }
        assert!(service.list("alice", 0).await.unwrap().is_empty());
    }
}
