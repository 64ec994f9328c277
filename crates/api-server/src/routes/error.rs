//! Error envelope shared by route handlers

use axum::{http::StatusCode, Json};
use chrono::Utc;
use cm_core::AuthError;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    success: bool,
    message: String,
    code: String,
    timestamp: String,
    request_id: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn route_error(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    request_id: &str,
) -> RouteError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            message: message.into(),
            code: code.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            request_id: request_id.to_string(),
        }),
    )
}

pub fn bad_request(code: &str, message: impl Into<String>, request_id: &str) -> RouteError {
    route_error(StatusCode::BAD_REQUEST, code, message, request_id)
}

pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::ProviderTokenExpired
        | AuthError::ProviderTokenRevoked
        | AuthError::ProviderInvalidToken(_)
        | AuthError::SessionTokenExpired
        | AuthError::SessionTokenInvalid(_) => StatusCode::UNAUTHORIZED,
        AuthError::ProviderUserDisabled => StatusCode::FORBIDDEN,
        AuthError::ProviderUserNotFound | AuthError::UserNotFound => StatusCode::NOT_FOUND,
        AuthError::InvalidTokenPayload(_) | AuthError::InvalidProfileUpdate(_) => {
            StatusCode::BAD_REQUEST
        }
        AuthError::DirectoryConflict(_) => StatusCode::CONFLICT,
        AuthError::ProviderUnavailable(_) | AuthError::DirectoryUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuthError::TokenSigning(_) | AuthError::ConfigurationMissing(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert a session failure into a response, logging server-side detail
pub fn auth_error(err: &AuthError, request_id: &str) -> RouteError {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(request_id, code = err.code(), error = %err, "request failed");
    } else {
        tracing::warn!(request_id, code = err.code(), error = %err, "request rejected");
    }
    route_error(status, err.code(), err.user_message(), request_id)
}
