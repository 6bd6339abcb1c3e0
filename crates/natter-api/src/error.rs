use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use natter_auth::{AuthError, PasswordError};
use natter_types::api::ErrorResponse;

use crate::creation::CreationError;

/// Every way a request can fail.
///
/// `NotFound` and `Forbidden` are distinct: handlers load the resource first
/// and only then apply the permission check, so an absent resource is always
/// reported as absent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Bad username/password at login.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Creation(#[from] CreationError),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::Issue(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Password(_) | Self::Creation(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side causes are logged, never echoed to the client.
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            match self {
                Self::Creation(_) => "failed to create chat".to_string(),
                _ => "internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
