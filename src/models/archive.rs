//! Completed, downloadable archives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for one completed crawl. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: String,
    /// Zip file name inside the archives directory.
    pub file_name: String,
    pub owner_id: String,
    /// On-disk size of the zip file in bytes.
    pub file_size: u64,
    /// First URL the crawl targeted.
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub from_schedule: Option<String>,
}

impl ArchiveRecord {
    pub fn new(
        file_name: String,
        owner_id: String,
        file_size: u64,
        source_url: String,
        from_schedule: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name,
            owner_id,
            file_size,
            source_url,
            created_at: Utc::now(),
            from_schedule,
        }
    }
}
