//! Errors surfaced to callers of the archive and schedule services.

use thiserror::Error;

use crate::models::ValidationError;
use crate::repository::DieselError;

/// Service-level error taxonomy.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Persistence(#[from] DieselError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn archive_not_found(id: &str) -> Self {
        ServiceError::NotFound(format!("Archive {}", id))
    }

    pub fn schedule_not_found(id: &str) -> Self {
        ServiceError::NotFound(format!("Schedule {}", id))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
