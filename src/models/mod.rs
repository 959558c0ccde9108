//! Domain models.

mod archive;
mod schedule;
mod settings;

pub use archive::ArchiveRecord;
pub use schedule::{ScheduleCadence, ScheduledJob};
pub use settings::{
    ArchiveRequest, CrawlSettings, RobotsPolicy, SettingType, StandardSettings,
    ValidatedRequest, ValidationError,
};

use serde::{Deserialize, Serialize};

/// One pipeline run's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub settings: CrawlSettings,
    pub owner_id: String,
    pub email: String,
    /// Schedule that triggered this run, if any.
    pub from_schedule: Option<String>,
}

impl ArchiveJob {
    pub fn new(settings: CrawlSettings, owner_id: String, email: String) -> Self {
        Self {
            settings,
            owner_id,
            email,
            from_schedule: None,
        }
    }
}
