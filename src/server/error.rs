//! Mapping of service errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    /// No owner id on the request.
    Unauthenticated,
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl ApiError {
    /// Status code and client-facing message.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Missing X-Owner-Id header".to_string(),
            ),
            ApiError::Service(ServiceError::Validation(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Service(ServiceError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("{} not found", what))
            }
            ApiError::Service(ServiceError::Persistence(_)) => (
                StatusCode::BAD_REQUEST,
                "The request could not be completed".to_string(),
            ),
            ApiError::Service(ServiceError::Io(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Service(ref e @ (ServiceError::Persistence(_) | ServiceError::Io(_))) = self {
            error!("Request failed: {}", e);
        }
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationError;
    use crate::repository::DieselError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                ServiceError::Validation(ValidationError::MissingUrl).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::archive_not_found("x").into(),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::Persistence(DieselError::NotFound).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Io(std::io::Error::other("disk")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_message().0, expected);
        }
    }

    #[test]
    fn test_persistence_details_are_not_echoed() {
        let err: ApiError = ServiceError::Persistence(DieselError::QueryBuilderError(
            "secret table detail".into(),
        ))
        .into();
        let (_, message) = err.status_and_message();
        assert!(!message.contains("secret"));
    }
}
