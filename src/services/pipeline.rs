//! The archive pipeline: crawl, reconcile, zip, persist, notify.
//!
//! One run is strictly sequential:
//!
//! ```text
//! Plan → PreviewCrawl → FullCrawl → Reconcile → Zip → PersistRecord → notify success
//!   └──────────────── any failure ────────────────────────────────→ notify failure
//! ```
//!
//! Runs share no in-memory state. Each owns the directories named after its
//! run id, so concurrent runs only collide if they start in the same
//! millisecond for the same host.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::archiver::{self, ArchiveFailure};
use crate::config::Settings;
use crate::crawler::command::{self, CommandBuilder};
use crate::crawler::reconcile::{self, move_tolerant};
use crate::crawler::{CommandRunner, ProcessError};
use crate::models::{ArchiveJob, ArchiveRecord, CrawlSettings};
use crate::notify::Notifier;
use crate::repository::{DieselArchiveRepository, DieselError};

/// Suffix of the directory the preview crawl writes into.
const PREVIEW_SUFFIX: &str = "_original";

/// Step of a run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Plan,
    PreviewCrawl,
    FullCrawl,
    Reconcile,
    Zip,
    PersistRecord,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Plan => "plan",
            PipelineStage::PreviewCrawl => "preview crawl",
            PipelineStage::FullCrawl => "full crawl",
            PipelineStage::Reconcile => "reconcile",
            PipelineStage::Zip => "zip",
            PipelineStage::PersistRecord => "persist record",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("No crawlable URL in the submitted settings")]
    NoTarget,

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Archive(#[from] ArchiveFailure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Persistence(#[from] DieselError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result of one pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(ArchiveRecord),
    Failed {
        stage: PipelineStage,
        error: StageError,
    },
}

impl PipelineOutcome {
    pub fn record(&self) -> Option<&ArchiveRecord> {
        match self {
            PipelineOutcome::Completed(record) => Some(record),
            PipelineOutcome::Failed { .. } => None,
        }
    }

    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineOutcome::Completed(_) => None,
            PipelineOutcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

type StageResult<T> = Result<T, (PipelineStage, StageError)>;

/// Tag an error with the stage it happened in.
trait AtStage<T> {
    fn at(self, stage: PipelineStage) -> StageResult<T>;
}

impl<T, E: Into<StageError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: PipelineStage) -> StageResult<T> {
        self.map_err(|e| (stage, e.into()))
    }
}

/// Everything a run needs, derived from the job before anything executes.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// `{hostname}_{timestamp}`; names every path the run owns.
    pub run_id: String,
    pub target: Url,
    pub hostnames: Vec<String>,
    /// Full crawl output directory.
    pub crawl_root: PathBuf,
    pub zip_path: PathBuf,
    pub file_name: String,
    /// Preview crawl output directory.
    pub preview_root: PathBuf,
    pub preview_command: String,
    pub full_command: String,
}

/// Run id for a host at a point in time, e.g. `example.com_2026-03-29_22-29-21-424`.
pub fn run_id(hostname: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", hostname, at.format("%Y-%m-%d_%H-%M-%S-%3f"))
}

/// Sequences one archive run and reports its outcome.
pub struct ArchivePipeline {
    settings: Arc<Settings>,
    commands: CommandBuilder,
    runner: Arc<dyn CommandRunner>,
    notifier: Notifier,
    archives: DieselArchiveRepository,
}

impl ArchivePipeline {
    pub fn new(
        settings: Arc<Settings>,
        runner: Arc<dyn CommandRunner>,
        notifier: Notifier,
        archives: DieselArchiveRepository,
    ) -> Self {
        let commands = CommandBuilder::new(settings.crawler.binary_path());
        Self {
            settings,
            commands,
            runner,
            notifier,
            archives,
        }
    }

    /// Resolve target, run id, paths and command lines for a job.
    pub fn plan(&self, settings: &CrawlSettings, now: DateTime<Utc>) -> Result<RunPlan, StageError> {
        let urls = command::target_urls(settings);
        let hostnames = command::hostnames(&urls);
        let (Some(target), Some(first_host)) = (urls.first(), hostnames.first()) else {
            return Err(StageError::NoTarget);
        };

        let run_id = run_id(first_host, now);
        let crawl_root = self.settings.archives_dir.join(&run_id);
        let file_name = format!("{}.zip", run_id);
        let zip_path = self.settings.archives_dir.join(&file_name);
        let preview_root = self
            .settings
            .previews_dir
            .join(format!("{}{}", run_id, PREVIEW_SUFFIX));

        let preview_command = self.commands.preview(target, &preview_root);
        let full_command =
            command::with_output_dir(&self.commands.archive(settings), &crawl_root);

        Ok(RunPlan {
            run_id,
            target: target.clone(),
            hostnames,
            crawl_root,
            zip_path,
            file_name,
            preview_root,
            preview_command,
            full_command,
        })
    }

    /// Run the job to completion and send exactly one result email.
    ///
    /// Never returns an error: failures are reported through the outcome
    /// and the failure email.
    pub async fn run(&self, job: &ArchiveJob) -> PipelineOutcome {
        let outcome = match self.plan(&job.settings, Utc::now()) {
            Ok(plan) => match self.execute(job, &plan).await {
                Ok(record) => PipelineOutcome::Completed(record),
                Err((stage, error)) => {
                    cleanup_failed_run(&plan).await;
                    PipelineOutcome::Failed { stage, error }
                }
            },
            Err(error) => PipelineOutcome::Failed {
                stage: PipelineStage::Plan,
                error,
            },
        };

        match outcome {
            PipelineOutcome::Completed(ref record) => {
                info!(
                    "Archive {} ({}) completed for owner {}",
                    record.file_name, record.id, record.owner_id
                );
                self.notifier.archive_ready(&job.email, record).await;
            }
            PipelineOutcome::Failed {
                stage,
                ref error,
            } => {
                error!(
                    "Archive of {} failed during {}: {}",
                    job.settings.display_url(),
                    stage,
                    error
                );
                self.notifier
                    .archive_failed(&job.email, &job.settings.display_url())
                    .await;
            }
        }

        outcome
    }

    /// Run the job on its own task.
    pub fn spawn(self: &Arc<Self>, job: ArchiveJob) -> JoinHandle<PipelineOutcome> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(&job).await })
    }

    async fn execute(&self, job: &ArchiveJob, plan: &RunPlan) -> StageResult<ArchiveRecord> {
        if let CrawlSettings::Advanced { ref arguments } = job.settings {
            warn!(
                "Running unsanitized advanced crawler arguments for owner {}: {}",
                job.owner_id, arguments
            );
        }
        info!("Starting archive run {}", plan.run_id);

        debug!("Preview crawl: {}", plan.preview_command);
        self.runner
            .run(&plan.preview_command)
            .await
            .at(PipelineStage::PreviewCrawl)?;

        debug!("Full crawl: {}", plan.full_command);
        self.runner
            .run(&plan.full_command)
            .await
            .at(PipelineStage::FullCrawl)?;

        let root = plan.crawl_root.clone();
        let hosts = plan.hostnames.clone();
        let reconciled = tokio::task::spawn_blocking(move || reconcile::reconcile(&root, &hosts))
            .await
            .at(PipelineStage::Reconcile)?
            .at(PipelineStage::Reconcile)?;

        let staging = reconciled.staging;
        let zip_path = plan.zip_path.clone();
        let file_size =
            tokio::task::spawn_blocking(move || archiver::zip_directory(&staging, &zip_path))
                .await
                .at(PipelineStage::Zip)?
                .at(PipelineStage::Zip)?;
        remove_dir_logged(&plan.crawl_root).await;

        let record = ArchiveRecord::new(
            plan.file_name.clone(),
            job.owner_id.clone(),
            file_size,
            plan.target.to_string(),
            job.from_schedule.clone(),
        );
        self.archives
            .insert(&record)
            .await
            .at(PipelineStage::PersistRecord)?;

        self.relocate_preview(plan, &record).await;

        Ok(record)
    }

    /// Move the preview tree to `{previews}/{record.id}` and drop the crawl leftovers.
    async fn relocate_preview(&self, plan: &RunPlan, record: &ArchiveRecord) {
        let preview_root = plan.preview_root.clone();
        let dest = self.settings.previews_dir.join(&record.id);
        let host = plan.target.host_str().unwrap_or_default().to_string();

        let result = tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
            let bare = host.strip_prefix("www.").unwrap_or(&host).to_string();
            for candidate in [host.clone(), format!("www.{}", bare), bare] {
                if move_tolerant(&preview_root.join(&candidate), &dest)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await;

        match result {
            Ok(Ok(true)) => debug!("Preview for {} ready", record.id),
            Ok(Ok(false)) => warn!("Preview crawl for {} produced no host directory", plan.run_id),
            Ok(Err(e)) => warn!("Failed to relocate preview for {}: {}", record.id, e),
            Err(e) => warn!("Preview relocation task failed for {}: {}", record.id, e),
        }
        remove_dir_logged(&plan.preview_root).await;
    }
}

/// Best-effort removal of everything a failed run wrote.
async fn cleanup_failed_run(plan: &RunPlan) {
    remove_dir_logged(&plan.crawl_root).await;
    remove_dir_logged(&plan.preview_root).await;
    match tokio::fs::remove_file(&plan.zip_path).await {
        Ok(()) => debug!("Removed partial archive {}", plan.zip_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", plan.zip_path.display(), e),
    }
}

async fn remove_dir_logged(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::models::{RobotsPolicy, StandardSettings};
    use crate::notify::LogMailer;
    use crate::repository::test_support::setup_test_db;
    use crate::crawler::ShellRunner;
    use chrono::TimeZone;

    async fn pipeline(data_dir: &Path) -> (ArchivePipeline, tempfile::TempDir) {
        let (pool, db_dir) = setup_test_db().await;
        let mut settings = Settings::with_data_dir(data_dir.to_path_buf());
        settings.crawler = CrawlerConfig {
            binary: Some("httrack".to_string()),
            ..Default::default()
        };
        let settings = Arc::new(settings);
        let notifier = Notifier::new(Arc::new(LogMailer), settings.clone());
        let pipeline = ArchivePipeline::new(
            settings,
            Arc::new(ShellRunner::new()),
            notifier,
            DieselArchiveRepository::new(pool),
        );
        (pipeline, db_dir)
    }

    #[test]
    fn test_run_id_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 7, 5, 1).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(run_id("example.com", at), "example.com_2026-03-09_07-05-01-042");
    }

    #[tokio::test]
    async fn test_plan_paths_and_commands() {
        let data = tempfile::tempdir().unwrap();
        let (pipeline, _db) = pipeline(data.path()).await;
        let settings = CrawlSettings::Standard(StandardSettings {
            url: "https://www.example.com/start".to_string(),
            include_domains: vec!["example.com".to_string()],
            exclude_paths: vec![],
            robots: RobotsPolicy::Ignore,
            structure: 0,
        });
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 7, 5, 1).unwrap();

        let plan = pipeline.plan(&settings, at).unwrap();

        assert_eq!(plan.run_id, "www.example.com_2026-03-09_07-05-01-000");
        assert_eq!(plan.hostnames, vec!["www.example.com", "example.com"]);
        assert_eq!(plan.file_name, format!("{}.zip", plan.run_id));
        assert_eq!(plan.zip_path, data.path().join("archives").join(&plan.file_name));
        assert!(plan.full_command.starts_with("httrack https://www.example.com/start example.com"));
        assert!(plan
            .full_command
            .ends_with(&format!("-O \"{}\"", plan.crawl_root.display())));
        assert!(plan.preview_command.contains(&format!(
            "-O \"{}\"",
            data.path().join("previews").join(format!("{}_original", plan.run_id)).display()
        )));
    }

    #[tokio::test]
    async fn test_plan_without_target_fails() {
        let data = tempfile::tempdir().unwrap();
        let (pipeline, _db) = pipeline(data.path()).await;
        let settings = CrawlSettings::Advanced {
            arguments: "-r3 -s0".to_string(),
        };
        assert!(matches!(
            pipeline.plan(&settings, Utc::now()),
            Err(StageError::NoTarget)
        ));
    }
}
