//! Listing, download, preview and deletion of finished archives.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{ServiceError, ServiceResult};
use crate::models::ArchiveRecord;
use crate::repository::DieselArchiveRepository;

/// Archives shown per listing page.
pub const ITEMS_PER_PAGE: u32 = 10;

/// Page served when a preview path names a directory.
const PREVIEW_INDEX: &str = "index.html";

#[derive(Clone)]
pub struct ArchiveService {
    repo: DieselArchiveRepository,
    settings: Arc<Settings>,
}

impl ArchiveService {
    pub fn new(repo: DieselArchiveRepository, settings: Arc<Settings>) -> Self {
        Self { repo, settings }
    }

    /// One page of the owner's archives, newest first. Pages start at 0.
    pub async fn list(&self, owner_id: &str, page: u32) -> ServiceResult<Vec<ArchiveRecord>> {
        Ok(self.repo.list_for_owner(owner_id, page, ITEMS_PER_PAGE).await?)
    }

    pub async fn count(&self, owner_id: &str) -> ServiceResult<u64> {
        Ok(self.repo.count_for_owner(owner_id).await?)
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> ServiceResult<ArchiveRecord> {
        self.repo
            .get_for_owner(id, owner_id)
            .await?
            .ok_or_else(|| ServiceError::archive_not_found(id))
    }

    /// Where an archive's zip lives on disk.
    pub fn archive_path(&self, record: &ArchiveRecord) -> PathBuf {
        self.settings.archives_dir.join(&record.file_name)
    }

    /// The record and zip path for a download. A record whose file is gone is not found.
    pub async fn download(&self, owner_id: &str, id: &str) -> ServiceResult<(ArchiveRecord, PathBuf)> {
        let record = self.get(owner_id, id).await?;
        let path = self.archive_path(&record);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!("Archive {} has no file at {}", id, path.display());
            return Err(ServiceError::archive_not_found(id));
        }
        Ok((record, path))
    }

    /// Resolve a file inside an archive's preview tree.
    ///
    /// An empty path or a directory resolves to its `index.html`. Paths that
    /// try to leave the preview directory are not found.
    pub async fn preview_file(
        &self,
        owner_id: &str,
        id: &str,
        relative: &str,
    ) -> ServiceResult<PathBuf> {
        let record = self.get(owner_id, id).await?;
        let root = self.settings.previews_dir.join(&record.id);
        let not_found = || ServiceError::NotFound(format!("Preview {}/{}", id, relative));

        let relative = sanitize_relative(relative).ok_or_else(not_found)?;
        let mut path = root.join(relative);
        if tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            path = path.join(PREVIEW_INDEX);
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(not_found()),
        }
    }

    /// Delete the record, its zip and its preview tree.
    ///
    /// A missing id fails with NotFound and touches nothing on disk. Once the
    /// row is gone the delete succeeds; files that cannot be removed are
    /// logged and left behind.
    pub async fn delete(&self, owner_id: &str, id: &str) -> ServiceResult<ArchiveRecord> {
        let record = self
            .repo
            .delete_for_owner(id, owner_id)
            .await?
            .ok_or_else(|| ServiceError::archive_not_found(id))?;

        let zip = self.archive_path(&record);
        match tokio::fs::remove_file(&zip).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Archive file {} was already gone", zip.display());
            }
            Err(e) => warn!("Failed to remove archive file {}: {}", zip.display(), e),
        }

        let preview = self.settings.previews_dir.join(&record.id);
        match tokio::fs::remove_dir_all(&preview).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove preview {}: {}", preview.display(), e),
        }

        info!("Deleted archive {} ({})", record.file_name, record.id);
        Ok(record)
    }
}

/// Normalize a client-supplied relative path, rejecting anything that climbs out.
fn sanitize_relative(relative: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}
