use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::handlers::shared::ApiResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient leave balance: {required} day(s) required, {available} available")]
    InsufficientBalance { required: i32, available: i32 },

    #[error("No candidate available: {0}")]
    NoCandidate(String),

    #[error("Invalid state transition: {entity} cannot go from {from} to {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Concurrent modification detected: {0}")]
    ConcurrencyConflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error{}", .0.as_ref().map_or(String::new(), |s| format!(": {}", s)))]
    Internal(Option<String>),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoCandidate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            AppError::Delivery(_) => StatusCode::BAD_GATEWAY,
            AppError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Database details are logged but never leaked to the caller.
        let error_message = match self {
            AppError::Database(err) => {
                log::error!("Database error surfaced to handler: {}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        log::error!(
            "Request failed with status {}: {}",
            status_code,
            error_message
        );

        let response_body = ApiResponse::<()>::error(&error_message);

        HttpResponse::build(status_code).json(response_body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        log::error!("Database error: {}", error);
        AppError::Database(error)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        // Repositories return anyhow::Result; unwrap sqlx errors back out so
        // they map to the right status and logging path.
        if error.is::<sqlx::Error>() {
            match error.downcast::<sqlx::Error>() {
                Ok(sqlx_err) => return AppError::Database(sqlx_err),
                Err(original_error) => {
                    return AppError::Internal(Some(original_error.to_string()));
                }
            }
        }

        log::error!("Unexpected error: {}", error);
        AppError::Internal(Some(error.to_string()))
    }
}

impl AppError {
    pub fn invalid_transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        AppError::InvalidStateTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}
