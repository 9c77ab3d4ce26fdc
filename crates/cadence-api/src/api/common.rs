// Common DTOs for public API
//
// Every successful body is wrapped in a `data` field. Failures carry either a
// plain `error` string or the per-field map produced by validation.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cadence_core::{Error, ValidationErrors, OVERLAP_MESSAGE};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Response body for rejected event payloads (422).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrorResponse {
    /// Summary: the first message, plus a count of the remaining ones.
    #[schema(example = "The title field is required.")]
    pub message: String,
    /// Messages per field. Overlap conflicts are reported under `overlap`.
    #[schema(example = json!({"title": ["The title field is required."]}))]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(errors: ValidationErrors) -> Self {
        let first = errors
            .first_message()
            .unwrap_or("The given data was invalid.")
            .to_string();
        let remaining = errors
            .fields()
            .values()
            .map(Vec::len)
            .sum::<usize>()
            .saturating_sub(1);
        let message = match remaining {
            0 => first,
            1 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {n} more errors)"),
        };

        Self {
            message,
            errors: errors.into_iter().collect(),
        }
    }
}

/// Response wrapper for single-item endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Response wrapper for list endpoints.
/// All list endpoints return responses wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Array of items returned by the list operation.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Error returned by event handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(Error::Validation(_) | Error::Overlap) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Domain(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Domain(Error::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Domain(Error::Validation(errors))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Domain(Error::Validation(errors)) => {
                let fields: Vec<_> = errors.fields().keys().collect();
                tracing::warn!(?fields, "Rejected event payload");
                (status, Json(ValidationErrorResponse::from(errors))).into_response()
            }
            ApiError::Domain(Error::Overlap) => {
                let errors = ValidationErrors::single("overlap", OVERLAP_MESSAGE);
                (status, Json(ValidationErrorResponse::from(errors))).into_response()
            }
            ApiError::Domain(Error::NotFound(id)) => {
                (status, Json(ErrorResponse::new(format!("Event not found: {id}")))).into_response()
            }
            ApiError::Domain(Error::Store(e)) => {
                tracing::error!("Event store failure: {}", e);
                (status, Json(ErrorResponse::new("Internal server error"))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_counts_remaining_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "The title field is required.");
        errors.add("starts_at", "The starts at field is required.");
        errors.add("ends_at", "The ends at field is required.");

        let body = ValidationErrorResponse::from(errors);
        assert_eq!(body.message, "The ends at field is required. (and 2 more errors)");
        assert_eq!(body.errors.len(), 3);
    }

    #[test]
    fn test_status_mapping() {
        let id = uuid::Uuid::now_v7();
        assert_eq!(
            ApiError::from(Error::Overlap).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(Error::NotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(Error::Store(cadence_core::StoreError::Closed)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
