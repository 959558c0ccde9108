//! Shared fixtures: a crawler stand-in and a mailer that records.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use arkivdium::crawler::{extract_urls, CommandRunner, ProcessError};
use arkivdium::models::{ArchiveRequest, SettingType};
use arkivdium::notify::{Email, MailError, Mailer};
use arkivdium::services::Services;
use arkivdium::Settings;

/// How the fake crawler behaves.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    #[default]
    Normal,
    FailPreview,
    FailFull,
    /// Both crawls exit cleanly but the full crawl writes nothing.
    NoOutput,
    /// The full crawl succeeds but a directory occupies the archive's zip path.
    BlockZip,
}

/// Writes a small site where the crawler would, instead of crawling.
#[derive(Default)]
pub struct FakeCrawler {
    pub mode: CrawlMode,
    commands: Mutex<Vec<String>>,
}

impl FakeCrawler {
    pub fn with_mode(mode: CrawlMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::with_mode(CrawlMode::FailFull)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

/// The quoted `-O` output directory of a command line.
fn output_dir(command_line: &str) -> PathBuf {
    let start = command_line.rfind("-O \"").expect("command has -O") + 4;
    let end = command_line[start..].find('"').expect("closing quote") + start;
    PathBuf::from(&command_line[start..end])
}

#[async_trait]
impl CommandRunner for FakeCrawler {
    async fn run(&self, command_line: &str) -> Result<(), ProcessError> {
        self.commands.lock().unwrap().push(command_line.to_string());

        let is_preview = command_line.contains("+*.html");
        let fails = match self.mode {
            CrawlMode::FailPreview => is_preview,
            CrawlMode::FailFull => !is_preview,
            _ => false,
        };
        if fails {
            return Err(ProcessError::Failed {
                command: command_line.to_string(),
                code: Some(1),
                stderr: "connection refused".to_string(),
            });
        }

        let out_dir = output_dir(command_line);
        if !is_preview {
            match self.mode {
                CrawlMode::NoOutput => {
                    std::fs::create_dir_all(&out_dir).unwrap();
                    return Ok(());
                }
                CrawlMode::BlockZip => {
                    let mut blocker = out_dir.clone().into_os_string();
                    blocker.push(".zip");
                    std::fs::create_dir_all(PathBuf::from(blocker).join("occupied")).unwrap();
                }
                _ => {}
            }
        }

        let host = extract_urls(command_line)
            .first()
            .and_then(|u| u.host_str().map(str::to_string))
            .expect("command names a URL");
        let site = out_dir.join(&host);

        std::fs::create_dir_all(site.join("img")).unwrap();
        std::fs::write(
            site.join("index.html"),
            format!("<html><body><h1>{}</h1><img src=\"img/logo.png\"></body></html>", host),
        )
        .unwrap();
        if !is_preview {
            std::fs::write(site.join("img/logo.png"), vec![7u8; 4096]).unwrap();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct Harness {
    pub services: Services,
    pub crawler: Arc<FakeCrawler>,
    pub mailer: Arc<RecordingMailer>,
    pub dir: TempDir,
}

pub async fn harness(crawler: FakeCrawler) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
    settings.crawler.binary = Some("httrack".to_string());
    settings.server_domain = "https://arkiv.example.org".to_string();

    let crawler = Arc::new(crawler);
    let mailer = Arc::new(RecordingMailer::default());
    let services = Services::open_with(settings, crawler.clone(), mailer.clone())
        .await
        .unwrap();

    Harness {
        services,
        crawler,
        mailer,
        dir,
    }
}

pub fn standard_request(url: &str, domain: &str) -> ArchiveRequest {
    ArchiveRequest {
        setting_type: SettingType::Standard,
        url: Some(url.to_string()),
        include_domains: vec![domain.to_string()],
        exclude_paths: vec!["/private".to_string()],
        email: "owner@example.org".to_string(),
        ..Default::default()
    }
}
