//! Result emails for archive runs.
//!
//! Delivery is best effort: a failed send is logged and never retried, and
//! never undoes an archive that was already stored.

pub mod templates;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::archiver::format_size;
use crate::config::{MailConfig, Settings};
use crate::models::ArchiveRecord;

const DEFAULT_SENDER: &str = "Arkivdium <no-reply@arkivdium.local>";
/// Upper bound on one mail request, connect included.
pub const MAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Errors from sending mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Mail endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Posts emails as JSON to a transactional mail endpoint.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        from: Option<String>,
    ) -> Result<Self, MailError> {
        Self::with_timeout(endpoint, api_key, from, MAIL_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: String,
        api_key: Option<String>,
        from: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from: from.unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = OutgoingMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };

        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Logs emails instead of sending them. Used when no endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!("Email to {} (not sent, no mail endpoint): {}", email.to, email.subject);
        Ok(())
    }
}

/// Pick the mailer for the configured endpoint.
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    let Some(ref endpoint) = config.endpoint else {
        return Arc::new(LogMailer);
    };
    match HttpMailer::new(endpoint.clone(), config.api_key.clone(), config.from.clone()) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!("Cannot set up mail client for {}, logging emails instead: {}", endpoint, e);
            Arc::new(LogMailer)
        }
    }
}

/// Builds and sends the two result emails.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    settings: Arc<Settings>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, settings: Arc<Settings>) -> Self {
        Self { mailer, settings }
    }

    /// Tell the owner their archive is ready. Returns whether the send succeeded.
    pub async fn archive_ready(&self, to: &str, record: &ArchiveRecord) -> bool {
        let download_url = self.settings.download_url(&record.id);
        let schedule_url = record
            .from_schedule
            .as_deref()
            .map(|id| self.settings.schedule_url(id));

        let email = Email {
            to: to.to_string(),
            subject: "Your archive is ready ✔".to_string(),
            html: templates::success_body(
                &record.source_url,
                &download_url,
                &format_size(record.file_size),
                schedule_url.as_deref(),
            ),
        };
        self.deliver(email).await
    }

    /// Tell the owner their archive could not be completed.
    pub async fn archive_failed(&self, to: &str, url: &str) -> bool {
        let email = Email {
            to: to.to_string(),
            subject: "Your archive could not be completed".to_string(),
            html: templates::failure_body(url),
        };
        self.deliver(email).await
    }

    async fn deliver(&self, email: Email) -> bool {
        match self.mailer.send(&email).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send \"{}\" to {}: {}", email.subject, email.to, e);
                false
            }
        }
    }
}
