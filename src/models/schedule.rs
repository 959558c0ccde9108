//! Recurring archive job definitions.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settings::CrawlSettings;
use super::ArchiveJob;

/// How often a scheduled job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleCadence {
    Daily,
    Weekly,
    Monthly,
}

impl ScheduleCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleCadence::Daily => "daily",
            ScheduleCadence::Weekly => "weekly",
            ScheduleCadence::Monthly => "monthly",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(ScheduleCadence::Daily),
            "weekly" => Some(ScheduleCadence::Weekly),
            "monthly" => Some(ScheduleCadence::Monthly),
            _ => None,
        }
    }

    /// The next run time one cadence step after `from`.
    ///
    /// Monthly steps clamp to the last day of shorter months.
    pub fn next_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ScheduleCadence::Daily => from + Duration::days(1),
            ScheduleCadence::Weekly => from + Duration::weeks(1),
            ScheduleCadence::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or_else(|| from + Duration::days(30)),
        }
    }
}

/// A recurring archive job owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub owner_id: String,
    pub email: String,
    pub settings: CrawlSettings,
    pub cadence: ScheduleCadence,
    pub paused: bool,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// Create a schedule that is due immediately.
    pub fn new(
        owner_id: String,
        email: String,
        settings: CrawlSettings,
        cadence: ScheduleCadence,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            email,
            settings,
            cadence,
            paused: false,
            next_run_at: now,
            last_run_at: None,
            created_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.paused && self.next_run_at <= now
    }

    /// Record a trigger at `now` and move `next_run_at` one step past it.
    pub fn mark_triggered(&mut self, now: DateTime<Utc>) {
        self.last_run_at = Some(now);
        self.next_run_at = self.cadence.next_after(now);
    }

    /// Unpause, skipping runs missed while paused.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.paused = false;
        if self.next_run_at < now {
            self.next_run_at = self.cadence.next_after(now);
        }
    }

    /// The one-off job a trigger of this schedule runs.
    pub fn to_job(&self) -> ArchiveJob {
        ArchiveJob {
            settings: self.settings.clone(),
            owner_id: self.owner_id.clone(),
            email: self.email.clone(),
            from_schedule: Some(self.id.clone()),
        }
    }
}
