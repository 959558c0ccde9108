//! Command-line interface.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{load_settings, Settings};
use crate::crawler::runner::binary_available;
use crate::models::{ArchiveJob, ArchiveRequest, ScheduleCadence, SettingType};
use crate::services::{validate_submission, PipelineOutcome, Services};

#[derive(Debug, Parser)]
#[command(name = "arkivdium", version, about = "Website archiving with HTTrack")]
pub struct Cli {
    /// Data directory (overrides the configured target)
    #[arg(long, global = true, env = "ARKIVDIUM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the web server and the scheduler
    Serve {
        #[arg(long, default_value = "127.0.0.1", env = "ARKIVDIUM_HOST")]
        host: String,
        #[arg(short, long, default_value_t = 3000, env = "ARKIVDIUM_PORT")]
        port: u16,
    },

    /// Archive a site now, or create a schedule with --schedule
    Archive(ArchiveArgs),

    /// List archives for an owner
    List {
        #[arg(long)]
        owner: String,
        /// Page number, starting at 0
        #[arg(long, default_value_t = 0)]
        page: u32,
    },

    /// Delete an archive and its files
    Delete {
        #[arg(long)]
        owner: String,
        id: String,
    },

    /// Manage scheduled archives
    Schedules {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Check that the crawler binary and data directories are usable
    Check,
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommands {
    List {
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    Pause {
        #[arg(long)]
        owner: String,
        id: String,
    },
    Resume {
        #[arg(long)]
        owner: String,
        id: String,
    },
    Delete {
        #[arg(long)]
        owner: String,
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    #[arg(long)]
    pub owner: String,
    /// Where the result email goes
    #[arg(long)]
    pub email: String,
    /// Start URL (standard settings)
    #[arg(long, required_unless_present = "advanced")]
    pub url: Option<String>,
    /// Domains the crawl may follow
    #[arg(long = "include")]
    pub include_domains: Vec<String>,
    /// Paths to skip, e.g. /private
    #[arg(long = "exclude")]
    pub exclude_paths: Vec<String>,
    /// 0 = ignore robots.txt, 1 = obey for files, 2 = obey fully
    #[arg(long, default_value_t = 0)]
    pub robots: u8,
    /// HTTrack structure option (-N)
    #[arg(long, default_value_t = 0)]
    pub structure: u8,
    /// Raw crawler arguments, passed through unmodified
    #[arg(long, conflicts_with = "url")]
    pub advanced: Option<String>,
    /// Create a recurring schedule instead of running once
    #[arg(long, value_parser = parse_cadence)]
    pub schedule: Option<ScheduleCadence>,
}

fn parse_cadence(s: &str) -> Result<ScheduleCadence, String> {
    ScheduleCadence::from_str(s).ok_or_else(|| format!("expected daily, weekly or monthly, got '{}'", s))
}

impl ArchiveArgs {
    fn to_request(&self) -> ArchiveRequest {
        ArchiveRequest {
            setting_type: if self.advanced.is_some() {
                SettingType::Advanced
            } else {
                SettingType::Standard
            },
            url: self.url.clone(),
            include_domains: self.include_domains.clone(),
            exclude_paths: self.exclude_paths.clone(),
            robots: self.robots,
            structure: self.structure,
            advanced_setting: self.advanced.clone(),
            email: self.email.clone(),
            schedule: self.schedule,
        }
    }
}

impl Cli {
    /// Settings from config files, with command-line overrides applied.
    pub async fn settings(&self) -> Settings {
        let settings = load_settings().await;
        match self.data_dir {
            Some(ref dir) => Settings {
                crawler: settings.crawler,
                mail: settings.mail,
                server_domain: settings.server_domain,
                schedule_tick: settings.schedule_tick,
                database_filename: settings.database_filename,
                ..Settings::with_data_dir(dir.clone())
            },
            None => settings,
        }
    }

    pub async fn run(self) -> Result<()> {
        let settings = self.settings().await;

        if let Commands::Check = self.command {
            return check(&settings);
        }

        let services = Services::open(settings)
            .await
            .context("Failed to open the archive database")?;

        match self.command {
            Commands::Serve { ref host, port } => crate::server::serve(services, host, port).await,
            Commands::Archive(ref args) => archive(&services, args).await,
            Commands::List { ref owner, page } => {
                let total = services.archives.count(owner).await?;
                for record in services.archives.list(owner, page).await? {
                    println!(
                        "{}  {}  {:>10}  {}  {}",
                        record.id,
                        record.created_at.format("%Y-%m-%d %H:%M"),
                        crate::archiver::format_size(record.file_size),
                        record.file_name,
                        record.source_url
                    );
                }
                println!("page {} ({} archives total)", page, total);
                Ok(())
            }
            Commands::Delete { ref owner, ref id } => {
                let record = services.archives.delete(owner, id).await?;
                println!("Deleted {}", record.file_name);
                Ok(())
            }
            Commands::Schedules { ref command } => schedules(&services, command).await,
            Commands::Check => Ok(()),
        }
    }
}

fn check(settings: &Settings) -> Result<()> {
    let binary = settings.crawler.binary_path();
    settings
        .ensure_directories()
        .with_context(|| format!("Cannot create {}", settings.data_dir.display()))?;
    println!("data directory: {}", settings.data_dir.display());
    println!("archives:       {}", settings.archives_dir.display());
    println!("previews:       {}", settings.previews_dir.display());

    if !binary_available(&binary) {
        bail!("Crawler binary {} not found", binary);
    }
    println!("crawler:        {}", binary);
    Ok(())
}

async fn archive(services: &Services, args: &ArchiveArgs) -> Result<()> {
    let validated = validate_submission(&args.to_request(), &services.settings.crawler)?;

    if let Some(cadence) = validated.schedule {
        let job = services.schedules.create(&args.owner, validated, cadence).await?;
        println!("Created {} schedule {}", job.cadence.as_str(), job.id);
        return Ok(());
    }

    let job = ArchiveJob::new(validated.settings, args.owner.clone(), validated.email);
    match services.pipeline.run(&job).await {
        PipelineOutcome::Completed(record) => {
            println!(
                "Archived {} as {} ({})",
                record.source_url,
                record.file_name,
                crate::archiver::format_size(record.file_size)
            );
            Ok(())
        }
        PipelineOutcome::Failed { stage, error } => {
            bail!("Archive failed during {}: {}", stage, error)
        }
    }
}

async fn schedules(services: &Services, command: &ScheduleCommands) -> Result<()> {
    match command {
        ScheduleCommands::List { owner, page } => {
            for job in services.schedules.list(owner, *page).await? {
                println!(
                    "{}  {:<8} {:<7} next {}  {}",
                    job.id,
                    job.cadence.as_str(),
                    if job.paused { "paused" } else { "active" },
                    job.next_run_at.format("%Y-%m-%d %H:%M"),
                    job.settings.display_url()
                );
            }
        }
        ScheduleCommands::Pause { owner, id } => {
            services.schedules.pause(owner, id).await?;
            println!("Paused {}", id);
        }
        ScheduleCommands::Resume { owner, id } => {
            let job = services.schedules.resume(owner, id).await?;
            println!("Resumed {}, next run at {}", id, job.next_run_at);
        }
        ScheduleCommands::Delete { owner, id } => {
            services.schedules.delete(owner, id).await?;
            println!("Deleted schedule {}", id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_args_to_request() {
        let cli = Cli::try_parse_from([
            "arkivdium",
            "archive",
            "--owner",
            "alice",
            "--email",
            "alice@example.org",
            "--url",
            "https://example.com",
            "--include",
            "example.com",
            "--exclude",
            "/private",
            "--schedule",
            "weekly",
        ])
        .unwrap();

        let Commands::Archive(args) = cli.command else {
            panic!("expected archive command");
        };
        let request = args.to_request();
        assert_eq!(request.setting_type, SettingType::Standard);
        assert_eq!(request.include_domains, vec!["example.com"]);
        assert_eq!(request.schedule, Some(ScheduleCadence::Weekly));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_advanced_conflicts_with_url() {
        let result = Cli::try_parse_from([
            "arkivdium",
            "archive",
            "--owner",
            "alice",
            "--email",
            "alice@example.org",
            "--url",
            "https://example.com",
            "--advanced",
            "https://example.com -r2",
        ]);
        assert!(result.is_err());
    }
}
