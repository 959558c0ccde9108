//! Configuration management for Arkivdium using the prefer crate.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default cron expression for the schedule tick (every minute).
pub const DEFAULT_SCHEDULE_TICK: &str = "0 * * * * *";

/// Crawler binary settings.
#[derive(Debug, Clone, Serialize, Deserialize, prefer::FromValue)]
pub struct CrawlerConfig {
    /// Explicit crawler binary. Overrides the platform default when set.
    #[serde(default)]
    pub binary: Option<String>,
    /// Whether the host runs Linux (`httrack` on PATH) or Windows (bundled exe).
    #[serde(default = "default_linux")]
    #[cfg_attr(not(target_os = "windows"), prefer(default = "true"))]
    #[cfg_attr(target_os = "windows", prefer(default = "false"))]
    pub linux: bool,
    /// Accept raw argument strings from ADVANCED submissions.
    #[serde(default = "default_allow_advanced")]
    #[prefer(default = "true")]
    pub allow_advanced: bool,
}

fn default_linux() -> bool {
    cfg!(not(target_os = "windows"))
}
fn default_allow_advanced() -> bool {
    true
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            linux: default_linux(),
            allow_advanced: default_allow_advanced(),
        }
    }
}

impl CrawlerConfig {
    /// Binary path as it appears at the start of a command line.
    ///
    /// The Windows default is quoted since the working directory may contain spaces.
    pub fn binary_path(&self) -> String {
        if let Some(ref binary) = self.binary {
            return binary.clone();
        }
        if self.linux {
            "httrack".to_string()
        } else {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            format!("\"{}/httrack/httrack.exe\"", cwd.display())
        }
    }
}

/// Outbound mail settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct MailConfig {
    /// Transactional mail endpoint (None = log only).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token for the endpoint.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sender address.
    #[serde(default)]
    pub from: Option<String>,
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Directory holding finished `.zip` archives and in-progress crawls.
    pub archives_dir: PathBuf,
    /// Directory holding preview trees keyed by archive id.
    pub previews_dir: PathBuf,
    /// Public base URL used in emailed links.
    pub server_domain: String,
    /// Crawler binary settings.
    pub crawler: CrawlerConfig,
    /// Outbound mail settings.
    pub mail: MailConfig,
    /// Cron expression for the scheduler tick.
    pub schedule_tick: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/arkivdium/ for user data
        let data_dir = dirs::document_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("arkivdium");

        Self {
            archives_dir: data_dir.join("archives"),
            previews_dir: data_dir.join("previews"),
            data_dir,
            database_filename: "arkivdium.db".to_string(),
            server_domain: "http://localhost:3000".to_string(),
            crawler: CrawlerConfig::default(),
            mail: MailConfig::default(),
            schedule_tick: DEFAULT_SCHEDULE_TICK.to_string(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            archives_dir: data_dir.join("archives"),
            previews_dir: data_dir.join("previews"),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.archives_dir)?;
        fs::create_dir_all(&self.previews_dir)?;
        Ok(())
    }

    /// Public download link for an archive.
    pub fn download_url(&self, archive_id: &str) -> String {
        format!(
            "{}/archives/{}",
            self.server_domain.trim_end_matches('/'),
            archive_id
        )
    }

    /// Public edit link for a schedule.
    pub fn schedule_url(&self, schedule_id: &str) -> String {
        format!(
            "{}/schedules/{}",
            self.server_domain.trim_end_matches('/'),
            schedule_id
        )
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default)]
    pub target: Option<String>,
    /// Database filename.
    #[serde(default)]
    pub database: Option<String>,
    /// Archives directory (defaults to `<target>/archives`).
    #[serde(default)]
    pub archives_dir: Option<String>,
    /// Previews directory (defaults to `<target>/previews`).
    #[serde(default)]
    pub previews_dir: Option<String>,
    /// Public base URL.
    #[serde(default)]
    pub server_domain: Option<String>,
    /// Scheduler tick cron expression.
    #[serde(default)]
    pub schedule_tick: Option<String>,
    #[serde(default)]
    pub crawler: Option<CrawlerConfig>,
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers arkivdium config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("arkivdium").await {
            Ok(pref_config) => {
                let target: Option<String> = pref_config.get("target").ok();
                let database: Option<String> = pref_config.get("database").ok();
                let archives_dir: Option<String> = pref_config.get("archives_dir").ok();
                let previews_dir: Option<String> = pref_config.get("previews_dir").ok();
                let server_domain: Option<String> = pref_config.get("server_domain").ok();
                let schedule_tick: Option<String> = pref_config.get("schedule_tick").ok();
                let crawler: Option<CrawlerConfig> = pref_config.get("crawler").ok();
                let mail: Option<MailConfig> = pref_config.get("mail").ok();

                Config {
                    target,
                    database,
                    archives_dir,
                    previews_dir,
                    server_domain,
                    schedule_tick,
                    crawler,
                    mail,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref target) = self.target {
            let path = shellexpand::tilde(target);
            settings.data_dir = PathBuf::from(path.as_ref());
            settings.archives_dir = settings.data_dir.join("archives");
            settings.previews_dir = settings.data_dir.join("previews");
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref dir) = self.archives_dir {
            settings.archives_dir = PathBuf::from(shellexpand::tilde(dir).as_ref());
        }
        if let Some(ref dir) = self.previews_dir {
            settings.previews_dir = PathBuf::from(shellexpand::tilde(dir).as_ref());
        }
        if let Some(ref domain) = self.server_domain {
            settings.server_domain = domain.clone();
        }
        if let Some(ref tick) = self.schedule_tick {
            settings.schedule_tick = tick.clone();
        }
        if let Some(ref crawler) = self.crawler {
            settings.crawler = crawler.clone();
        }
        if let Some(ref mail) = self.mail {
            settings.mail = mail.clone();
        }
    }
}

/// Load settings from configuration (async version).
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings
}
