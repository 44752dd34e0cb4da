// SPDX-License-Identifier: Apache-2.0
//! Error types for the bookswap HTTP surface

use crate::auth::AuthError;
use crate::guard::Decision;
use crate::store::StoreError;
use crate::validator::ValidationError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{decision}")]
    RateLimited {
        decision: Decision,
        retry_after_secs: u64,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] StoreError),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::RateLimited { decision, .. } => match decision {
                Decision::Banned { .. } => (StatusCode::TOO_MANY_REQUESTS, "BANNED"),
                _ => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            },
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Self::Auth(err) => match err {
                AuthError::UsernameTaken => (StatusCode::CONFLICT, "USERNAME_TAKEN"),
                AuthError::UnknownUser => (StatusCode::FORBIDDEN, "UNKNOWN_USER"),
                AuthError::WrongPassword => (StatusCode::FORBIDDEN, "WRONG_PASSWORD"),
                AuthError::MissingToken => (StatusCode::FORBIDDEN, "NOT_LOGGED_IN"),
                AuthError::InvalidToken => (StatusCode::FORBIDDEN, "INVALID_TOKEN"),
                AuthError::Invalid(_) => (StatusCode::FORBIDDEN, "INVALID_DATA"),
                AuthError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE"),
                AuthError::MissingSecret | AuthError::Hashing(_) | AuthError::Issue(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
                }
            },
            Self::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Storage details stay in the logs.
        let error = match &self {
            Self::Storage(_) | Self::Auth(AuthError::Store(_)) => {
                "Service temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        match self {
            Self::RateLimited {
                retry_after_secs, ..
            } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(ErrorResponse {
                    error,
                    code,
                    retry_after_secs: Some(retry_after_secs),
                }),
            )
                .into_response(),
            _ => (
                status,
                Json(ErrorResponse {
                    error,
                    code,
                    retry_after_secs: None,
                }),
            )
                .into_response(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
