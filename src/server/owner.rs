//! Caller identity extraction.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::ApiError;

/// Header carrying the caller's owner id.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The owner every archive and schedule operation is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(|owner| OwnerId(owner.to_string()))
            .ok_or(ApiError::Unauthenticated)
    }
}
