//! Profile endpoints for authenticated callers

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use cm_core::user::{ProfileUpdate, UserRecord};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthenticatedUser,
    routes::{
        error::{auth_error, bad_request, new_request_id, RouteError},
        json::JsonBody,
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    id: String,
    phone_number: String,
    stable_id: String,
    email: Option<String>,
    name: Option<String>,
    date_of_birth: Option<NaiveDate>,
    business_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRecord> for ProfileView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            phone_number: user.phone_number,
            stable_id: user.stable_id,
            email: user.email,
            name: user.name,
            date_of_birth: user.date_of_birth,
            business_type: user.business_type,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct DataEnvelope<T> {
    success: bool,
    data: T,
    timestamp: String,
}

impl<T> DataEnvelope<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    date_of_birth: Option<String>,
    #[serde(rename = "businessType")]
    business_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdatedFields {
    updated_fields: Vec<&'static str>,
}

/// Accepts a bare date or a full RFC 3339 timestamp
fn parse_date_of_birth(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<Json<DataEnvelope<ProfileView>>, RouteError> {
    let request_id = new_request_id();
    let user = state
        .sessions()
        .profile(&caller)
        .await
        .map_err(|err| auth_error(&err, &request_id))?;

    Ok(Json(DataEnvelope::new(user.into())))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<DataEnvelope<UpdatedFields>>, RouteError> {
    let request_id = new_request_id();

    let date_of_birth = match non_blank(req.date_of_birth) {
        Some(raw) => Some(parse_date_of_birth(&raw).ok_or_else(|| {
            bad_request(
                "VALIDATION_ERROR",
                "date_of_birth must be YYYY-MM-DD",
                &request_id,
            )
        })?),
        None => None,
    };
    let update = ProfileUpdate {
        name: non_blank(req.name),
        date_of_birth,
        business_type: non_blank(req.business_type),
    };

    let mut updated_fields = Vec::new();
    if update.name.is_some() {
        updated_fields.push("name");
    }
    if update.date_of_birth.is_some() {
        updated_fields.push("date_of_birth");
    }
    if update.business_type.is_some() {
        updated_fields.push("businessType");
    }

    state
        .sessions()
        .update_profile(&caller, update)
        .await
        .map_err(|err| auth_error(&err, &request_id))?;

    Ok(Json(DataEnvelope::new(UpdatedFields { updated_fields })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/user/profile", get(get_profile).post(update_profile))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{build_state, TestState};

    fn app(state: &TestState) -> Router {
        Router::new()
            .merge(crate::routes::auth::router())
            .merge(super::router())
            .with_state(state.app.clone())
    }

    async fn send(state: &TestState, request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn access_token(state: &TestState) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/token")
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "idToken": "valid-id-token" }).to_string()))
            .unwrap();
        let (_, payload) = send(state, request).await;
        payload["accessToken"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn profile_requires_bearer() {
        let state = build_state().await;
        let request = Request::builder()
            .uri("/user/profile")
            .body(Body::empty())
            .unwrap();

        let (status, payload) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload["code"], "MISSING_BEARER");
    }

    #[tokio::test]
    async fn garbage_bearer_is_unauthorized() {
        let state = build_state().await;
        let request = Request::builder()
            .uri("/user/profile")
            .header("Authorization", "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();

        let (status, payload) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload["code"], "SESSION_INVALID");
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let state = build_state().await;
        let token = access_token(&state).await;

        let request = Request::builder()
            .method("POST")
            .uri("/user/profile")
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(Body::from(
                json!({ "date_of_birth": "1990-04-12", "businessType": "retail" }).to_string(),
            ))
            .unwrap();
        let (status, payload) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            payload["data"]["updated_fields"],
            json!(["date_of_birth", "businessType"])
        );

        let request = Request::builder()
            .uri("/user/profile")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, payload) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["data"]["phoneNumber"], "+15551234567");
        assert_eq!(payload["data"]["name"], "Ada");
        assert_eq!(payload["data"]["dateOfBirth"], "1990-04-12");
        assert_eq!(payload["data"]["businessType"], "retail");
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let state = build_state().await;
        let token = access_token(&state).await;

        let request = Request::builder()
            .method("POST")
            .uri("/user/profile")
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "name": "  " }).to_string()))
            .unwrap();
        let (status, payload) = send(&state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["code"], "INVALID_PROFILE_UPDATE");
    }

    #[test]
    fn test_parse_date_of_birth() {
        let expected = NaiveDate::from_ymd_opt(1990, 4, 12);
        assert_eq!(parse_date_of_birth("1990-04-12"), expected);
        assert_eq!(parse_date_of_birth("1990-04-12T00:00:00Z"), expected);
        assert_eq!(parse_date_of_birth("12/04/1990"), None);
    }

    #[tokio::test]
    async fn malformed_profile_body_gets_json_envelope() {
        let state = build_state().await;
        let token = access_token(&state).await;

        let request = Request::builder()
            .method("POST")
            .uri("/user/profile")
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let (status, payload) = send(&state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["code"], "VALIDATION_ERROR");
    }
}
