//! Service layer for Arkivdium business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services are shared by the CLI and the web server.

pub mod archive;
pub mod pipeline;
pub mod schedule;
pub mod scheduler;

pub use archive::{ArchiveService, ITEMS_PER_PAGE};
pub use pipeline::{ArchivePipeline, PipelineOutcome, PipelineStage, StageError};
pub use schedule::ScheduleService;
pub use scheduler::{start_scheduler, ScheduleTrigger};

use std::sync::Arc;

use tracing::warn;

use crate::config::{CrawlerConfig, Settings};
use crate::crawler::{CommandRunner, ShellRunner};
use crate::models::{ArchiveRequest, CrawlSettings, ValidatedRequest, ValidationError};
use crate::notify::{mailer_from_config, Mailer, Notifier};
use crate::repository::{self, DieselArchiveRepository, DieselScheduleRepository};

/// Validate a submission against the server's crawler policy.
pub fn validate_submission(
    request: &ArchiveRequest,
    crawler: &CrawlerConfig,
) -> Result<ValidatedRequest, ValidationError> {
    let validated = request.validate()?;
    if let CrawlSettings::Advanced { ref arguments } = validated.settings {
        if !crawler.allow_advanced {
            return Err(ValidationError::AdvancedDisabled);
        }
        warn!("Accepted raw advanced crawler arguments: {}", arguments);
    }
    Ok(validated)
}

/// Everything built from one set of settings.
#[derive(Clone)]
pub struct Services {
    pub settings: Arc<Settings>,
    pub archives: ArchiveService,
    pub schedules: ScheduleService,
    pub pipeline: Arc<ArchivePipeline>,
    pub trigger: ScheduleTrigger,
}

impl Services {
    /// Open the database and wire services with the shell runner and the configured mailer.
    pub async fn open(settings: Settings) -> anyhow::Result<Self> {
        let mailer = mailer_from_config(&settings.mail);
        Self::open_with(settings, Arc::new(ShellRunner::new()), mailer).await
    }

    /// Open with an explicit command runner and mailer.
    pub async fn open_with(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        settings.ensure_directories()?;
        let pool = repository::open(&settings.database_path()).await?;
        let settings = Arc::new(settings);

        let archive_repo = DieselArchiveRepository::new(pool.clone());
        let schedule_repo = DieselScheduleRepository::new(pool);
        let notifier = Notifier::new(mailer, settings.clone());
        let pipeline = Arc::new(ArchivePipeline::new(
            settings.clone(),
            runner,
            notifier,
            archive_repo.clone(),
        ));

        Ok(Self {
            archives: ArchiveService::new(archive_repo, settings.clone()),
            schedules: ScheduleService::new(schedule_repo.clone()),
            trigger: ScheduleTrigger::new(schedule_repo, pipeline.clone()),
            pipeline,
            settings,
        })
    }
}
