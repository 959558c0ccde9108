//! Periodic trigger for recurring archive jobs.
//!
//! ```text
//! Scheduler tick (every minute by default)
//!     │
//!     └─► find_due(now)
//!             └─► For each job → claim (advance next_run_at) → spawn pipeline run
//! ```
//!
//! A job's next run time is persisted before its run is spawned, so a job
//! triggers at most once per tick even if the run outlives the tick. The
//! claim only succeeds while the row is unchanged since `find_due`; a job
//! deleted or paused in between is skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::models::ScheduledJob;
use crate::repository::{DieselError, DieselScheduleRepository};
use crate::services::pipeline::{ArchivePipeline, PipelineOutcome};

/// Turns due schedules into pipeline runs.
#[derive(Clone)]
pub struct ScheduleTrigger {
    schedules: DieselScheduleRepository,
    pipeline: Arc<ArchivePipeline>,
}

impl ScheduleTrigger {
    pub fn new(schedules: DieselScheduleRepository, pipeline: Arc<ArchivePipeline>) -> Self {
        Self {
            schedules,
            pipeline,
        }
    }

    /// Trigger every job due at `now`. Returns the handles of the spawned runs.
    pub async fn tick(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<JoinHandle<PipelineOutcome>>, DieselError> {
        let due = self.schedules.find_due(now).await?;
        if due.is_empty() {
            debug!("No schedules due");
            return Ok(Vec::new());
        }

        info!("Found {} schedules due", due.len());
        let mut handles = Vec::with_capacity(due.len());
        for job in due {
            if let Some(handle) = self.trigger(job, now).await? {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Claim one job found due at `now` and spawn its run.
    ///
    /// Returns `None` when the stored schedule no longer matches `job`.
    pub async fn trigger(
        &self,
        mut job: ScheduledJob,
        now: DateTime<Utc>,
    ) -> Result<Option<JoinHandle<PipelineOutcome>>, DieselError> {
        let due_at = job.next_run_at;
        job.mark_triggered(now);
        if !self.schedules.claim_run(&job, due_at).await? {
            debug!("Schedule {} changed since it was found due, skipping", job.id);
            return Ok(None);
        }

        info!(
            "Triggering schedule {} for {}, next run at {}",
            job.id,
            job.settings.display_url(),
            job.next_run_at
        );
        Ok(Some(self.pipeline.spawn(job.to_job())))
    }
}

/// Start the cron-driven scheduler tick.
pub async fn start_scheduler(trigger: ScheduleTrigger, cron: &str) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let tick_job = Job::new_async(cron, move |_uuid, _lock| {
        let trigger = trigger.clone();
        Box::pin(async move {
            if let Err(e) = trigger.tick(Utc::now()).await {
                error!("Schedule tick failed: {}", e);
            }
        })
    })?;

    scheduler.add(tick_job).await?;
    scheduler.start().await?;

    info!("Scheduler started (tick: {})", cron);
    Ok(scheduler)
}
