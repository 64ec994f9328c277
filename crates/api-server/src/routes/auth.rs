use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use cm_core::token::TokenResponse;
use serde::{Deserialize, Serialize};

use crate::{
    routes::{
        error::{auth_error, bad_request, new_request_id, RouteError},
        json::JsonBody,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenRequest {
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenEnvelope {
    success: bool,
    #[serde(flatten)]
    tokens: TokenResponse,
    timestamp: String,
    request_id: String,
}

impl TokenEnvelope {
    fn new(tokens: TokenResponse, request_id: String) -> Self {
        Self {
            success: true,
            tokens,
            timestamp: Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

async fn generate_token(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<GenerateTokenRequest>,
) -> Result<Json<TokenEnvelope>, RouteError> {
    let request_id = new_request_id();
    if req.id_token.trim().is_empty() {
        return Err(bad_request(
            "VALIDATION_ERROR",
            "idToken is required",
            &request_id,
        ));
    }

    tracing::info!(request_id, "generating session tokens");
    let tokens = state
        .sessions()
        .generate_session(req.id_token.trim())
        .await
        .map_err(|err| auth_error(&err, &request_id))?;

    Ok(Json(TokenEnvelope::new(tokens, request_id)))
}

async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshTokenRequest>,
) -> Result<Json<TokenEnvelope>, RouteError> {
    let request_id = new_request_id();
    if req.refresh_token.trim().is_empty() {
        return Err(bad_request(
            "VALIDATION_ERROR",
            "refreshToken is required",
            &request_id,
        ));
    }

    tracing::info!(request_id, "refreshing session tokens");
    let tokens = state
        .sessions()
        .refresh_session(req.refresh_token.trim())
        .await
        .map_err(|err| auth_error(&err, &request_id))?;

    Ok(Json(TokenEnvelope::new(tokens, request_id)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/token", post(generate_token))
        .route("/auth/refresh", post(refresh_token))
}
