use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use cm_core::token::SessionTokenPayload;

use crate::{
    routes::error::{auth_error, new_request_id, route_error, RouteError},
    state::AppState,
};

/// Caller identity verified from an `Authorization: Bearer` access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionTokenPayload);

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or("Authorization header is required")?
        .to_str()
        .map_err(|_| "Invalid authorization header format")?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err("Invalid authorization header format"),
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = new_request_id();
        let token = bearer_token(&parts.headers).map_err(|message| {
            route_error(StatusCode::UNAUTHORIZED, "MISSING_BEARER", message, &request_id)
        })?;

        match state.sessions().authorize(token) {
            Ok(payload) => Ok(Self(payload)),
            Err(err) => {
                // Every verification failure on a protected route is a 401.
                let (_, body) = auth_error(&err, &request_id);
                Err((StatusCode::UNAUTHORIZED, body))
            }
        }
    }
}
