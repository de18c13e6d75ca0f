use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use referral_core::ServiceError;

use crate::google::CredentialError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Google sign-in is not configured")]
    OAuthDisabled,

    #[error("Google sign-in failed: {0}")]
    OAuth(#[from] CredentialError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Service(ServiceError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Service(ServiceError::EmptyName) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::OAuthDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::OAuth(_) => StatusCode::BAD_GATEWAY,
            ApiError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
